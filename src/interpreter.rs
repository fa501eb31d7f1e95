//! Turns poll results into a personality update by asking the model.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::character::is_truthy;
use crate::config::Config;
use crate::error::{PollError, Result};
use crate::openai::{ChatMessage, CompletionClient};
use crate::twitter::Poll;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. Respond with valid JSON only.";

const REQUIRED_KEYS: [&str; 3] = ["update_bio", "update_adjectives", "update_style_all"];

/// The three character fields the model is asked to rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityUpdate {
    pub update_bio: String,
    pub update_adjectives: Vec<String>,
    pub update_style_all: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollTally {
    pub yes: u64,
    pub no: u64,
}

impl PollTally {
    /// Count votes for the "yes" and "no" options. Labels are trimmed and
    /// lowercased; anything else is ignored. A repeated label replaces the
    /// earlier count, and a missing count is zero.
    pub fn from_poll(poll: &Poll) -> Self {
        let mut tally = Self::default();
        for option in &poll.options {
            match option.label.trim().to_lowercase().as_str() {
                "yes" => tally.yes = option.votes.unwrap_or(0),
                "no" => tally.no = option.votes.unwrap_or(0),
                _ => {}
            }
        }
        tally
    }
}

/// Direction the personality should move in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Rebellious,
    Academic,
}

impl Shift {
    /// Ties go to `Academic`.
    pub fn from_tally(tally: PollTally) -> Self {
        if tally.yes > tally.no {
            Shift::Rebellious
        } else {
            Shift::Academic
        }
    }

    pub fn tone(&self) -> &'static str {
        match self {
            Shift::Rebellious => "a more rebellious, edgy tone",
            Shift::Academic => "a more academic, precise, and thoughtful tone",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shift::Rebellious => write!(f, "rebellious"),
            Shift::Academic => write!(f, "academic"),
        }
    }
}

pub fn build_prompt(character_name: &str, post_text: &str, tally: PollTally) -> String {
    let shift = Shift::from_tally(tally);
    let outcome = match shift {
        Shift::Rebellious => "'yes' won",
        Shift::Academic if tally.yes == tally.no => "the poll is a tie",
        Shift::Academic => "'no' won",
    };

    format!(
        r#"You are an assistant that analyzes Twitter poll results to decide how to update a character's personality.
The character is named {character_name}. The configuration must include:
 - update_bio: a string to be appended to the bio
 - update_adjectives: a list of adjectives
 - update_style_all: a list of style instructions

The poll has two options: 'yes' and 'no'. If 'yes' wins (i.e., more yes votes), then the character should adopt a more rebellious, edgy tone. If 'no' wins or there is a tie, the character should shift toward a more academic, precise, and thoughtful tone.

Here are the poll details:
Poll question: {post_text}
Yes votes: {yes}
No votes: {no}

Outcome: {outcome}, so {character_name} should adopt {tone}.

Please output a valid JSON object with exactly the keys "update_bio", "update_adjectives", and "update_style_all"."#,
        yes = tally.yes,
        no = tally.no,
        tone = shift.tone(),
    )
}

/// Validate the model's raw answer and decode it.
pub fn parse_update(raw: &str) -> Result<PersonalityUpdate> {
    if raw.is_empty() {
        return Err(PollError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(raw)
        .map_err(|e| PollError::malformed(format!("invalid JSON: {e}"), raw))?;
    let object = value
        .as_object()
        .ok_or_else(|| PollError::malformed("expected a JSON object", raw))?;

    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| !object.get(*key).is_some_and(is_truthy))
        .collect();
    if !missing.is_empty() {
        return Err(PollError::malformed(
            format!("missing keys: {}", missing.join(", ")),
            raw,
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| PollError::malformed(format!("unexpected value type: {e}"), raw))
}

pub struct Interpreter {
    client: CompletionClient,
    character_name: String,
}

impl Interpreter {
    pub fn new(config: &Config) -> Self {
        Self {
            client: CompletionClient::new(config),
            character_name: config.character_name.clone(),
        }
    }

    /// One completion call per invocation; no retry on a bad answer.
    pub async fn interpret(&self, poll: &Poll, post_text: &str) -> Result<PersonalityUpdate> {
        let tally = PollTally::from_poll(poll);
        let shift = Shift::from_tally(tally);
        debug!(?poll, "Interpreting poll");
        info!(yes = tally.yes, no = tally.no, %shift, "Poll results");

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(&self.character_name, post_text, tally)),
        ];
        let content = self
            .client
            .complete(&messages)
            .await?
            .ok_or(PollError::EmptyResponse)?;

        let update = parse_update(&content)?;
        info!(
            model = self.client.model(),
            adjectives = update.update_adjectives.len(),
            styles = update.update_style_all.len(),
            "Received personality update"
        );
        Ok(update)
    }
}
