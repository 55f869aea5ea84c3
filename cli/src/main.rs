//! riskfeed CLI: watch and debug the real-time event feed from the terminal.
//!
//! # Commands
//! ```text
//! riskfeed listen  [--config <file.json>] [--url <base-url>] [--topic <T>]... [--json]
//! riskfeed match   --topic <T> --type <EVENT_TYPE>
//! riskfeed backoff [--config <file.json>]
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;

use riskfeed_core::{BackoffPolicy, FeedConfig, Topic};

mod cmd_listen;
mod logging;

#[derive(Parser)]
#[command(
    name = "riskfeed",
    about = "Real-time covenant, alert and risk-score feed: RiskFeed CLI",
    long_about = "
RiskFeed CLI: subscribe to the live event feed and inspect topic matching.

ENVIRONMENT VARIABLES:
  RISKFEED_WS_URL                  Base URL of the event server
  RISKFEED_WS_PATH                 Endpoint path (default /ws/events)
  RISKFEED_RECONNECT_DELAY_MS      First reconnect delay (default 1000)
  RISKFEED_MAX_RECONNECT_ATTEMPTS  Reconnect attempts before giving up (default 5)
  RUST_LOG                         Log filter, overrides --verbose
",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print events as they arrive
    Listen {
        /// JSON config file (defaults + RISKFEED_* env when omitted)
        #[arg(long)]
        config: Option<String>,
        /// Base URL of the event server (overrides config)
        #[arg(long)]
        url: Option<String>,
        /// Topic to subscribe to; repeatable (default: every known event type)
        #[arg(long = "topic")]
        topics: Vec<String>,
        /// Print each event as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Check whether a topic matches an event type
    Match {
        /// Topic, e.g. `covenant:*` or `event:ALERT_CREATED`
        #[arg(long)]
        topic: String,
        /// Event type, e.g. `COVENANT_UPDATE`
        #[arg(long = "type")]
        event_type: String,
    },

    /// Print the reconnect delay schedule
    Backoff {
        /// JSON config file (defaults + RISKFEED_* env when omitted)
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_tracing(&logging::LogConfig {
        level: if cli.verbose { "debug" } else { "info" }.into(),
        json: cli.log_json,
        ..Default::default()
    });

    match cli.command {
        Commands::Listen { config, url, topics, json } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(url) = url {
                config = config.with_base_url(url);
            }
            cmd_listen::run(config, &topics, json).await
        }

        Commands::Match { topic, event_type } => {
            cmd_match(&topic, &event_type);
            Ok(())
        }

        Commands::Backoff { config } => cmd_backoff(&load_config(config.as_deref())?),
    }
}

fn load_config(path: Option<&str>) -> Result<FeedConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(Path::new(path))
                .with_context(|| format!("read config file '{path}'"))?;
            serde_json::from_str(&text).with_context(|| format!("parse config file '{path}'"))
        }
        None => FeedConfig::from_env().context("load config from environment"),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn cmd_match(topic: &str, event_type: &str) {
    let parsed = Topic::parse(topic);
    let rule = match &parsed {
        Topic::EventType(_) => "exact event type",
        Topic::Wildcard(_) => "case-insensitive prefix",
        Topic::Literal(_) => "literal",
    };
    let verdict = if parsed.matches(event_type) { "MATCH" } else { "no match" };
    println!("{verdict}: '{topic}' vs '{event_type}' ({rule})");
}

fn cmd_backoff(config: &FeedConfig) -> Result<()> {
    let policy = BackoffPolicy::new(config.backoff());
    println!("Endpoint: {}", config.endpoint()?);
    println!("Reconnect schedule:");
    let mut total_ms = 0u128;
    for (n, delay) in policy.schedule().iter().enumerate() {
        total_ms += delay.as_millis();
        println!(
            "  attempt {:>2}: wait {:>7}ms  (elapsed {:>7}ms)",
            n + 1,
            delay.as_millis(),
            total_ms
        );
    }
    println!("  then give up until the next explicit connect");
    Ok(())
}
