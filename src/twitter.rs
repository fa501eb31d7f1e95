//! Minimal X (Twitter) API v2 client: just enough to find the newest poll
//! posted by one account.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{PollError, Result};

/// Page size for the timeline request. The API does not accept fewer than 5.
pub const TIMELINE_PAGE_SIZE: u32 = 5;

const TWEET_FIELDS: &str = "attachments,created_at,text";
const POLL_EXPANSION: &str = "attachments.poll_ids";
const POLL_FIELDS: &str = "id,options,duration_minutes,end_datetime";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Attachments>,
}

impl Tweet {
    /// First poll referenced by this tweet, if any.
    pub fn poll_id(&self) -> Option<&str> {
        self.attachments
            .as_ref()
            .and_then(|a| a.poll_ids.as_ref())
            .and_then(|ids| ids.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attachments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Poll {
    pub id: String,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollOption {
    pub label: String,
    /// Absent or `null` when X withholds the count.
    #[serde(default)]
    pub votes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct UserLookup {
    data: Option<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Timeline {
    #[serde(default)]
    data: Option<Vec<Tweet>>,
    #[serde(default)]
    includes: Option<Includes>,
    #[serde(default)]
    meta: Option<TimelineMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    polls: Vec<Poll>,
}

#[derive(Debug, Default, Deserialize)]
struct TimelineMeta {
    #[serde(default)]
    result_count: u32,
}

/// Walk tweets newest first and pair the first one whose poll resolves
/// against the included polls.
pub fn first_poll_tweet(tweets: Vec<Tweet>, polls: &[Poll]) -> Option<(Tweet, Poll)> {
    tweets.into_iter().find_map(|tweet| {
        let poll = tweet
            .poll_id()
            .and_then(|id| polls.iter().find(|p| p.id == id))
            .cloned()?;
        Some((tweet, poll))
    })
}

pub struct TwitterClient {
    http: reqwest::Client,
    api_url: String,
    bearer_token: String,
}

impl TwitterClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.twitter_api_url.clone(),
            bearer_token: config.twitter_bearer_token.clone(),
        }
    }

    /// Find the most recent tweet by `username` that carries a poll.
    ///
    /// `Ok(None)` means the account has tweets but none of the latest page
    /// has a poll. A missing account or an empty timeline is an error.
    pub async fn find_latest_poll(&self, username: &str) -> Result<Option<(Tweet, Poll)>> {
        let user_id = self.user_id(username).await?;
        debug!(username, user_id = %user_id, "Resolved X account");

        let timeline = self.timeline(&user_id).await?;
        let result_count = timeline.meta.as_ref().map(|m| m.result_count);
        let tweets = match timeline.data {
            Some(tweets) if result_count != Some(0) && !tweets.is_empty() => tweets,
            _ => {
                return Err(PollError::NoPostsFound {
                    username: username.to_string(),
                })
            }
        };
        let polls = timeline.includes.map(|i| i.polls).unwrap_or_default();

        info!(tweets = tweets.len(), polls = polls.len(), "Fetched recent tweets");
        Ok(first_poll_tweet(tweets, &polls))
    }

    async fn user_id(&self, username: &str) -> Result<String> {
        let url = format!("{}/2/users/by/username/{}", self.api_url, username);
        let lookup: UserLookup = self.get_json(&url, &[]).await?;
        lookup
            .data
            .map(|u| u.id)
            .ok_or_else(|| PollError::AccountNotFound {
                username: username.to_string(),
            })
    }

    async fn timeline(&self, user_id: &str) -> Result<Timeline> {
        let url = format!("{}/2/users/{}/tweets", self.api_url, user_id);
        let page_size = TIMELINE_PAGE_SIZE.to_string();
        let query = [
            ("max_results", page_size.as_str()),
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", POLL_EXPANSION),
            ("poll.fields", POLL_FIELDS),
        ];
        self.get_json(&url, &query).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let mut request = self.http.get(url).bearer_auth(&self.bearer_token);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PollError::Api {
                service: "X",
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}
