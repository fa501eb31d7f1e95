//! poll-persona
//!
//! Reads the newest poll posted by an X account, asks an OpenAI-compatible
//! model how the poll result should reshape an elizaOS character, and writes
//! the new `bio`, `adjectives` and `style.all` back into the character file.

pub mod character;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod openai;
pub mod pipeline;
pub mod twitter;

pub use character::apply_update;
pub use config::Config;
pub use error::{PollError, Result};
pub use interpreter::{Interpreter, PersonalityUpdate, PollTally, Shift};
pub use pipeline::{run, Outcome, RunOptions, Stage, StageError};
pub use twitter::{Poll, PollOption, Tweet, TwitterClient};
