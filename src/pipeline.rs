//! Fetch → interpret → update, in that order, once.

use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::character::{apply_update, apply_update_to_document, load_character, render_character};
use crate::config::Config;
use crate::error::{PollError, Result};
use crate::interpreter::{Interpreter, PersonalityUpdate};
use crate::twitter::TwitterClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Interpreting,
    Updating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Interpreting => "interpreting",
            Stage::Updating => "updating",
        };
        f.write_str(name)
    }
}

/// Per-run switches that come from the command line rather than the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Print the merged character instead of writing it.
    pub dry_run: bool,
    pub character_file: Option<PathBuf>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The account's latest tweets carry no poll. Nothing was changed.
    NoPoll,
    Updated {
        tweet_id: String,
        update: PersonalityUpdate,
    },
    DryRun {
        tweet_id: String,
        update: PersonalityUpdate,
        document: String,
    },
}

/// A failure together with the stage it happened in.
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub error: PollError,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageError> {
        self.map_err(|error| StageError { stage, error })
    }
}

/// Run the whole pipeline once. No step is retried and nothing is rolled
/// back; the character file is only written after a valid update arrived.
pub async fn run(config: &Config, options: &RunOptions) -> std::result::Result<Outcome, StageError> {
    let username = options
        .username
        .as_deref()
        .unwrap_or(&config.twitter_username);
    let character_file = options
        .character_file
        .as_ref()
        .unwrap_or(&config.character_file);

    info!(stage = %Stage::Fetching, username, "Looking for the latest poll");
    let twitter = TwitterClient::new(config);
    let Some((tweet, poll)) = twitter
        .find_latest_poll(username)
        .await
        .at(Stage::Fetching)?
    else {
        warn!(username, "No poll tweet found");
        return Ok(Outcome::NoPoll);
    };
    info!(tweet_id = %tweet.id, poll_id = %poll.id, "Found poll tweet");

    info!(stage = %Stage::Interpreting, "Asking the model to interpret the poll");
    let interpreter = Interpreter::new(config);
    let update = interpreter
        .interpret(&poll, &tweet.text)
        .await
        .at(Stage::Interpreting)?;

    info!(stage = %Stage::Updating, path = %character_file.display(), dry_run = options.dry_run, "Applying update");
    if options.dry_run {
        let document = preview(&update, character_file).at(Stage::Updating)?;
        return Ok(Outcome::DryRun {
            tweet_id: tweet.id,
            update,
            document,
        });
    }

    apply_update(&update, character_file).at(Stage::Updating)?;
    Ok(Outcome::Updated {
        tweet_id: tweet.id,
        update,
    })
}

fn preview(update: &PersonalityUpdate, path: &std::path::Path) -> Result<String> {
    let mut document = load_character(path)?;
    apply_update_to_document(&mut document, update, path)?;
    render_character(&document, path)
}
