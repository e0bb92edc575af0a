use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use roster::catalog::{MeetingCandidate, ScheduleQuery, UserCandidate};
use roster::config::RuleConfig;
use roster::engine::MatchEngine;
use roster::logging::setup_logging;
use tracing::info;

/// Match freeform schedule rows against a meeting and user catalog.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON array of meeting candidates.
    #[arg(long)]
    meetings: PathBuf,

    /// JSON array of user candidates.
    #[arg(long)]
    users: PathBuf,

    /// JSON array of schedule queries to match.
    #[arg(long)]
    schedule: PathBuf,

    /// Optional TOML rule configuration; built-in defaults otherwise.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_logging();

    let ruleset = RuleConfig::load(args.config.as_deref())
        .context("failed to load rule configuration")?
        .compile()
        .context("failed to compile rule configuration")?;

    let meetings: Vec<MeetingCandidate> = read_json(&args.meetings)?;
    let users: Vec<UserCandidate> = read_json(&args.users)?;
    let schedule: Vec<ScheduleQuery> = read_json(&args.schedule)?;
    info!(
        meetings = meetings.len(),
        users = users.len(),
        queries = schedule.len(),
        "catalog loaded"
    );

    let mut engine = MatchEngine::new(ruleset, meetings, users);
    let results = engine.match_all(&schedule);

    serde_json::to_writer_pretty(std::io::stdout().lock(), &results)
        .context("failed to write results")?;
    println!();
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
