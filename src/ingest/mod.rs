// src/ingest/mod.rs

use crate::book::{BookMove, PositionKey, PositionTable};
use crate::crawler;
use crate::error::{BookError, BookResult};
use crate::pgn::{GameReader, GameRecord};
use crate::players::RelevanceFilter;
use rayon::prelude::*;
use shakmaty::Position;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct IngestOptions {
    /// Moves at ply `depth` and beyond are ignored.
    pub depth: u32,
    /// Lowercase words; an event containing any of them is skipped.
    pub excluded_events: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files: usize,
    pub games_read: usize,
    pub games_used: usize,
    pub invalid: usize,
    pub filtered: usize,
}

impl AddAssign for IngestStats {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.games_read += other.games_read;
        self.games_used += other.games_used;
        self.invalid += other.invalid;
        self.filtered += other.filtered;
    }
}

/// What happened to one game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    ExcludedEvent,
    NoRankedPlayer,
}

/// Partial result of ingesting some files: table, counters and per-file failures.
pub struct Harvest<K: PositionKey> {
    pub table: PositionTable<K>,
    pub stats: IngestStats,
    pub failures: Vec<(PathBuf, BookError)>,
}

impl<K: PositionKey> Harvest<K> {
    fn empty() -> Self {
        Self {
            table: PositionTable::new(),
            stats: IngestStats::default(),
            failures: Vec::new(),
        }
    }

    fn combine(mut self, mut other: Self) -> Self {
        self.table.merge(&mut other.table);
        self.stats += other.stats;
        self.failures.append(&mut other.failures);
        self
    }
}

/// Feeds validated games into position tables.
pub struct Ingestor<'a> {
    options: &'a IngestOptions,
    filter: &'a RelevanceFilter,
    stop: &'a AtomicBool,
}

impl<'a> Ingestor<'a> {
    pub fn new(options: &'a IngestOptions, filter: &'a RelevanceFilter, stop: &'a AtomicBool) -> Self {
        Self { options, filter, stop }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn is_excluded_event(&self, event: Option<&str>) -> bool {
        let Some(event) = event else {
            return false;
        };
        let event = event.to_lowercase();
        self.options.excluded_events.iter().any(|word| event.contains(word.as_str()))
    }

    /// Records the moves of `game` into `scratch`.
    ///
    /// Only moves played by a relevant side before the depth cutoff are
    /// observed. Rejected games leave `scratch` untouched.
    pub fn ingest_game<K: PositionKey>(&self, game: &GameRecord, scratch: &mut PositionTable<K>) -> Verdict {
        if self.is_excluded_event(game.event.as_deref()) {
            return Verdict::ExcludedEvent;
        }
        let white = self.filter.is_relevant(&game.white.name);
        let black = self.filter.is_relevant(&game.black.name);
        if !white && !black {
            return Verdict::NoRankedPlayer;
        }

        let mut pos = game.start.clone();
        for (ply, m) in (0u32..).zip(&game.moves) {
            if ply >= self.options.depth {
                break;
            }
            let mover = pos.turn();
            let relevant = if mover.is_white() { white } else { black };
            if relevant {
                if let Some(book_move) = BookMove::from_move(m) {
                    scratch.observe(K::of(&pos), book_move, game.player(mover).result, ply);
                }
            }
            pos.play_unchecked(*m);
        }
        Verdict::Accepted
    }

    /// Reads every game from a PGN stream into `table`, one whole game at a time.
    pub fn ingest_reader<K: PositionKey, R: Read>(
        &self,
        input: R,
        table: &mut PositionTable<K>,
    ) -> std::io::Result<IngestStats> {
        let mut stats = IngestStats::default();
        self.read_games(input, table, &mut stats)?;
        Ok(stats)
    }

    /// Like [`Ingestor::ingest_reader`], but counts into `stats` as it goes so
    /// games merged before a read error are still accounted for.
    pub fn read_games<K: PositionKey, R: Read>(
        &self,
        input: R,
        table: &mut PositionTable<K>,
        stats: &mut IngestStats,
    ) -> std::io::Result<()> {
        let mut reader = GameReader::new(input);
        let mut scratch = PositionTable::new();

        while !self.stopped() {
            let Some(game) = reader.next_game()? else {
                break;
            };
            stats.games_read += 1;
            let game = match game {
                Ok(game) => game,
                Err(_) => {
                    stats.invalid += 1;
                    continue;
                }
            };

            scratch.clear();
            match self.ingest_game(&game, &mut scratch) {
                Verdict::Accepted => {
                    table.merge(&mut scratch);
                    stats.games_used += 1;
                }
                verdict => {
                    debug!(?verdict, white = %game.white.name, black = %game.black.name, "game skipped");
                    stats.filtered += 1;
                }
            }
        }
        Ok(())
    }

    /// Ingests one source file, expanding it first if it is an archive.
    ///
    /// Counts land in `stats` even when the file fails partway through.
    pub fn ingest_file<K: PositionKey>(
        &self,
        path: &Path,
        table: &mut PositionTable<K>,
        stats: &mut IngestStats,
    ) -> BookResult<()> {
        crawler::visit_source(path, |pgn| {
            let file = File::open(pgn).map_err(|e| BookError::io(pgn, e))?;
            self.read_games(BufReader::new(file), table, stats)
                .map_err(|e| BookError::io(pgn, e))
        })?;
        stats.files += 1;
        info!(
            file = %path.display(),
            read = stats.games_read,
            used = stats.games_used,
            "ingested"
        );
        Ok(())
    }

    /// Ingests all sources on `jobs` threads and merges the per-file tables.
    ///
    /// Partial tables are combined in source order, so the result does not
    /// depend on scheduling.
    pub fn ingest_all<K: PositionKey>(&self, sources: &[PathBuf], jobs: usize) -> BookResult<Harvest<K>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| BookError::Config(format!("cannot start {jobs} workers: {e}")))?;

        let harvest = pool.install(|| {
            sources
                .par_iter()
                .map(|path| {
                    let mut harvest = Harvest::empty();
                    if self.stopped() {
                        return harvest;
                    }
                    if let Err(e) = self.ingest_file(path, &mut harvest.table, &mut harvest.stats) {
                        warn!(
                            file = %path.display(),
                            used = harvest.stats.games_used,
                            "{e}"
                        );
                        harvest.failures.push((path.clone(), e));
                    }
                    harvest
                })
                .reduce(Harvest::empty, Harvest::combine)
        });
        Ok(harvest)
    }
}
