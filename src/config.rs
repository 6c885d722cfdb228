// src/config.rs

use crate::book::OutputFormat;
use crate::constants::{
    DEFAULT_DEPTH, DEFAULT_EXCLUDED_EVENTS, DEFAULT_MAX_VARIATIONS, DEFAULT_MIN_WINS, MAX_VARIATIONS_CAP,
};
use crate::error::{BookError, BookResult};
use crate::ingest::IngestOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// How positions are identified in the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// Polyglot Zobrist hash
    Zobrist,
    /// FEN without move counters (text output only)
    Fen,
}

/// Settings for one book-building run. Can be stored as a JSON profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub depth: u32,
    pub max_variations: usize,
    pub min_wins: u64,
    pub format: OutputFormat,
    pub key: KeyKind,
    pub ranked: Option<PathBuf>,
    pub excluded_events: Vec<String>,
    /// Worker threads; 0 means one per logical CPU.
    pub jobs: usize,
    pub audit_log: Option<PathBuf>,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: None,
            depth: DEFAULT_DEPTH,
            max_variations: DEFAULT_MAX_VARIATIONS,
            min_wins: DEFAULT_MIN_WINS,
            format: OutputFormat::Bin,
            key: KeyKind::Zobrist,
            ranked: None,
            excluded_events: DEFAULT_EXCLUDED_EVENTS.iter().map(|s| s.to_string()).collect(),
            jobs: 0,
            audit_log: None,
        }
    }
}

impl BookConfig {
    /// Checks the settings before any work starts. Clamps the variation cap
    /// and resolves the worker count.
    pub fn validate(&mut self) -> BookResult<()> {
        if self.inputs.is_empty() {
            return Err(BookError::Config("no input files or directories given".to_string()));
        }
        if self.output.is_none() {
            return Err(BookError::Config("no output path given".to_string()));
        }
        if self.depth == 0 {
            return Err(BookError::Config("depth must be at least 1".to_string()));
        }
        if self.max_variations == 0 {
            return Err(BookError::Config("alternative move cap must be at least 1".to_string()));
        }
        if self.min_wins == 0 {
            return Err(BookError::Config("min-wins must be at least 1".to_string()));
        }
        if self.key == KeyKind::Fen && self.format == OutputFormat::Bin {
            return Err(BookError::Config("FEN keys can only be written as csv".to_string()));
        }
        if self.max_variations > MAX_VARIATIONS_CAP {
            warn!("capping alternative moves at {MAX_VARIATIONS_CAP} (asked for {})", self.max_variations);
            self.max_variations = MAX_VARIATIONS_CAP;
        }
        if self.jobs == 0 {
            self.jobs = num_cpus::get();
        }
        for word in &mut self.excluded_events {
            *word = word.trim().to_lowercase();
        }
        self.excluded_events.retain(|w| !w.is_empty());
        Ok(())
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            depth: self.depth,
            excluded_events: self.excluded_events.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> BookResult<BookConfig> {
    let json = fs::read_to_string(path).map_err(|e| BookError::io(path, e))?;
    serde_json::from_str(&json).map_err(|e| BookError::Config(format!("{}: {e}", path.display())))
}

pub fn save_config(path: &Path, config: &BookConfig) -> BookResult<()> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| BookError::Config(format!("cannot serialize profile: {e}")))?;
    fs::write(path, json).map_err(|e| BookError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn runnable() -> BookConfig {
        BookConfig {
            inputs: vec![PathBuf::from("games")],
            output: Some(PathBuf::from("book.bin")),
            ..BookConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = BookConfig::default();
        assert_eq!(config.depth, 40);
        assert_eq!(config.max_variations, 5);
        assert_eq!(config.min_wins, 2);
        assert_eq!(config.format, OutputFormat::Bin);
        assert_eq!(config.excluded_events, ["blitz", "bullet"]);
    }

    #[test]
    fn test_missing_input_or_output() {
        let mut no_input = runnable();
        no_input.inputs.clear();
        assert!(matches!(no_input.validate(), Err(BookError::Config(_))));

        let mut no_output = runnable();
        no_output.output = None;
        assert!(matches!(no_output.validate(), Err(BookError::Config(_))));
    }

    #[test]
    fn test_fen_keys_need_text_output() {
        let mut config = runnable();
        config.key = KeyKind::Fen;
        assert!(config.validate().is_err());
        config.format = OutputFormat::Csv;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_clamps_and_resolves() {
        let mut config = runnable();
        config.max_variations = 12;
        config.excluded_events = vec![" Rapid ".to_string(), "".to_string()];
        config.validate().unwrap();
        assert_eq!(config.max_variations, 5);
        assert!(config.jobs >= 1);
        assert_eq!(config.excluded_events, ["rapid"]);
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        for tweak in [
            (|c: &mut BookConfig| c.depth = 0) as fn(&mut BookConfig),
            |c| c.max_variations = 0,
            |c| c.min_wins = 0,
        ] {
            let mut config = runnable();
            tweak(&mut config);
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_profile_round_trip_and_partial_profiles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let mut config = runnable();
        config.depth = 20;
        config.format = OutputFormat::Csv;
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);

        fs::write(&path, r#"{ "depth": 12, "format": "csv" }"#).unwrap();
        let partial = load_config(&path).unwrap();
        assert_eq!(partial.depth, 12);
        assert_eq!(partial.format, OutputFormat::Csv);
        assert_eq!(partial.max_variations, 5);
    }

    #[test]
    fn test_bad_profile_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ depth: ").unwrap();
        assert!(matches!(load_config(&path), Err(BookError::Config(_))));
    }
}
