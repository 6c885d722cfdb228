mod app;
mod book;
mod config;
mod constants;
mod crawler;
mod error;
mod ingest;
mod pgn;
mod players;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::book::OutputFormat;
use crate::config::{load_config, save_config, BookConfig, KeyKind};

/// Builds a Polyglot opening book from PGN games.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PGN files, gzip archives or directories containing them
    input: Vec<PathBuf>,

    /// Output book path
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Maximum number of alternative moves per position (at most 5)
    #[arg(short = 'a', long)]
    alt_moves: Option<usize>,

    /// Only record moves played before this ply
    #[arg(short, long)]
    depth: Option<u32>,

    /// List of ranked players, one "last,first" per line
    #[arg(short, long)]
    ranked: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Position key
    #[arg(long, value_enum)]
    key: Option<KeyKind>,

    /// Minimum wins a move needs to be published
    #[arg(long)]
    min_wins: Option<u64>,

    /// Skip events whose name contains this word (repeatable)
    #[arg(long = "exclude-event")]
    exclude_events: Vec<String>,

    /// Worker threads (default: one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Record each ranked-player decision in this file
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Load settings from a JSON profile
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings to a JSON profile
    #[arg(long)]
    save_config: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(BookConfig, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => load_config(path).with_context(|| format!("loading profile {}", path.display()))?,
            None => BookConfig::default(),
        };
        if !self.input.is_empty() {
            config.inputs = self.input;
        }
        if self.out.is_some() {
            config.output = self.out;
        }
        if let Some(alt_moves) = self.alt_moves {
            config.max_variations = alt_moves;
        }
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if self.ranked.is_some() {
            config.ranked = self.ranked;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(key) = self.key {
            config.key = key;
        }
        if let Some(min_wins) = self.min_wins {
            config.min_wins = min_wins;
        }
        if !self.exclude_events.is_empty() {
            config.excluded_events = self.exclude_events;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if self.audit_log.is_some() {
            config.audit_log = self.audit_log;
        }
        Ok((config, self.save_config))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    std::panic::set_hook(Box::new(tracing_panic::panic_hook));

    let (mut config, save_path) = Args::parse().into_config()?;
    config.validate()?;
    if let Some(path) = save_path {
        save_config(&path, &config).with_context(|| format!("saving profile {}", path.display()))?;
    }

    let app = App::new(config);
    let stop = app.stop_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted!");
        stop.store(true, Ordering::SeqCst);
    })
    .context("failed to set Ctrl-C handler")?;

    let report = app.run()?;
    println!(
        "Read {} games ({} used, {} invalid, {} filtered). {} moves written for {} positions.",
        report.stats.games_read,
        report.stats.games_used,
        report.stats.invalid,
        report.stats.filtered,
        report.book.entries,
        report.book.positions,
    );
    if report.failed_files > 0 {
        eprintln!("{} file(s) could not be read, see the log above.", report.failed_files);
    }
    Ok(())
}
