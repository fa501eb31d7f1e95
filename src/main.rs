//! poll-persona - update an elizaOS character from the latest X poll.
//!
//! Required environment variables:
//! - TWITTER_BEARER_TOKEN: X API v2 bearer token
//! - TWITTER_USERNAME: account that posts the polls (without the @)
//! - OPENAI_API_KEY: OpenAI (or compatible) API key
//!
//! Optional: TWITTER_API_URL, OPENAI_BASE_URL, OPENAI_MODEL, CHARACTER_FILE,
//! CHARACTER_NAME, RUST_LOG.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use poll_persona::{run, Config, Outcome, RunOptions};

#[derive(Debug, Default)]
struct Options {
    help: bool,
    run: RunOptions,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options> {
    let mut opts = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => opts.help = true,
            "--dry-run" => opts.run.dry_run = true,
            "--character" => {
                let path = args.next().context("--character needs a path")?;
                opts.run.character_file = Some(PathBuf::from(path));
            }
            "--username" => {
                let name = args.next().context("--username needs a handle")?;
                opts.run.username = Some(name.trim_start_matches('@').to_string());
            }
            other => anyhow::bail!("Unknown argument: {other} (see --help)"),
        }
    }

    Ok(opts)
}

fn usage() {
    println!(
        "{}",
        [
            "poll-persona",
            "",
            "Reads the latest poll posted by TWITTER_USERNAME, asks the model how the",
            "result should change the character, and rewrites bio/adjectives/style.all.",
            "",
            "Flags:",
            "  --character <path>   Character file (overrides CHARACTER_FILE)",
            "  --username <handle>  Account to read polls from (overrides TWITTER_USERNAME)",
            "  --dry-run            Print the updated character instead of writing it",
            "  -h, --help           Show this help",
            "",
            "Env:",
            "  TWITTER_BEARER_TOKEN, TWITTER_USERNAME, OPENAI_API_KEY (required)",
            "  TWITTER_API_URL, OPENAI_BASE_URL, OPENAI_MODEL (optional)",
            "  CHARACTER_FILE (default characters/eliza.character.json)",
            "  CHARACTER_NAME (default Eliza)",
        ]
        .join("\n")
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,poll_persona=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    if opts.help {
        usage();
        return ExitCode::SUCCESS;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&config, &opts.run).await {
        Ok(Outcome::NoPoll) => {
            info!("No poll tweet found; character left unchanged");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Updated { tweet_id, update }) => {
            println!("✅ Character updated from poll tweet {tweet_id}");
            println!("   bio += {:?}", update.update_bio);
            println!("   adjectives = {:?}", update.update_adjectives);
            println!("   style.all = {:?}", update.update_style_all);
            ExitCode::SUCCESS
        }
        Ok(Outcome::DryRun { tweet_id, document, .. }) => {
            info!(tweet_id = %tweet_id, "Dry run; character file not written");
            println!("{document}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(stage = %e.stage, "{}", e.error);
            ExitCode::FAILURE
        }
    }
}
