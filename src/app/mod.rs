// app/mod.rs

use crate::book::{BookEncoder, EncodeSummary, OutputFormat, PositionKey, PositionTable};
use crate::config::{BookConfig, KeyKind};
use crate::crawler;
use crate::error::{BookError, BookResult};
use crate::ingest::{IngestStats, Ingestor};
use crate::players::{read_ranked, RelevanceFilter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Default)]
pub struct RunReport {
    pub stats: IngestStats,
    pub book: EncodeSummary,
    pub failed_files: usize,
    pub interrupted: bool,
}

/// One book-building run: crawl, ingest, encode.
pub struct App {
    config: BookConfig,
    stop: Arc<AtomicBool>,
}

impl App {
    /// `config` must already be validated.
    pub fn new(config: BookConfig) -> Self {
        Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting this flag stops ingestion at the next game boundary.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    fn output(&self) -> BookResult<&Path> {
        self.config
            .output
            .as_deref()
            .ok_or_else(|| BookError::Config("no output path given".to_string()))
    }

    fn relevance_filter(&self) -> BookResult<RelevanceFilter> {
        let patterns = match &self.config.ranked {
            Some(path) => {
                let patterns = read_ranked(path)?;
                info!(path = %path.display(), players = patterns.len(), "loaded ranked players");
                Some(patterns)
            }
            None => None,
        };
        let filter = RelevanceFilter::new(patterns);
        match &self.config.audit_log {
            Some(path) => {
                let file = File::create(path).map_err(|e| BookError::io(path, e))?;
                Ok(filter.with_audit(Box::new(BufWriter::new(file))))
            }
            None => Ok(filter),
        }
    }

    pub fn run(&self) -> BookResult<RunReport> {
        let output = self.output()?;
        let sources = crawler::discover(&self.config.inputs)?;
        if sources.is_empty() {
            return Err(BookError::Config("no PGN files or archives found in the inputs".to_string()));
        }
        info!(sources = sources.len(), jobs = self.config.jobs, "reading games");

        let filter = self.relevance_filter()?;
        let report = match self.config.key {
            KeyKind::Zobrist => self.build::<u64>(&sources, &filter, output),
            KeyKind::Fen => self.build::<String>(&sources, &filter, output),
        };
        filter.flush_audit();
        report
    }

    fn build<K: PositionKey>(
        &self,
        sources: &[PathBuf],
        filter: &RelevanceFilter,
        output: &Path,
    ) -> BookResult<RunReport> {
        let options = self.config.ingest_options();
        let ingestor = Ingestor::new(&options, filter, &self.stop);
        let harvest = ingestor.ingest_all::<K>(sources, self.config.jobs)?;

        let interrupted = self.stop.load(Ordering::Relaxed);
        if interrupted {
            warn!(games = harvest.stats.games_used, "interrupted, writing book from the games read so far");
        }
        info!(
            games = harvest.stats.games_read,
            used = harvest.stats.games_used,
            positions = harvest.table.len(),
            moves = harvest.table.move_count(),
            "generating opening book"
        );

        let encoder = BookEncoder::new(self.config.max_variations, self.config.min_wins);
        let book = write_book(&encoder, &harvest.table, self.config.format, output)?;
        info!(path = %output.display(), entries = book.entries, positions = book.positions, "book written");

        Ok(RunReport {
            stats: harvest.stats,
            book,
            failed_files: harvest.failures.len(),
            interrupted,
        })
    }
}

/// Writes the book next to `path` and moves it into place once complete.
pub fn write_book<K: PositionKey>(
    encoder: &BookEncoder,
    table: &PositionTable<K>,
    format: OutputFormat,
    path: &Path,
) -> BookResult<EncodeSummary> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| BookError::io(dir, e))?;

    let summary = {
        let mut out = BufWriter::new(tmp.as_file_mut());
        let summary = encoder.write(table, format, &mut out)?;
        out.flush().map_err(|e| BookError::io(path, e))?;
        summary
    };
    tmp.persist(path).map_err(|e| BookError::io(path, e.error))?;
    Ok(summary)
}
