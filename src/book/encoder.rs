// src/book/encoder.rs

use super::codec::BookMove;
use super::key::PositionKey;
use super::stats::{Candidate, PositionTable};
use crate::constants::{ENTRY_SIZE, FIELD_MODULUS};
use crate::error::{BookError, BookResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::{self, Read, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Polyglot: 16-byte big-endian records.
    Bin,
    /// One line per position: key, then move,weight,learn triples.
    Csv,
}

/// A single Polyglot record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookEntry {
    pub key: u64,
    pub raw_move: u16,
    pub weight: u16,
    pub learn: u32,
}

impl BookEntry {
    /// Builds a record, wrapping weight and learn modulo 65535.
    /// A weight that ends up as zero is rejected.
    pub fn new(key: u64, mv: &BookMove, weight: u32, learn: u32) -> BookResult<Self> {
        let stored = (weight % FIELD_MODULUS) as u16;
        if weight == 0 || stored == 0 {
            return Err(BookError::InvalidWeight { weight, stored });
        }
        Ok(Self {
            key,
            raw_move: mv.encode(),
            weight: stored,
            learn: learn % FIELD_MODULUS,
        })
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut bytes = [0u8; ENTRY_SIZE];
        bytes[0..8].copy_from_slice(&self.key.to_be_bytes());
        bytes[8..10].copy_from_slice(&self.raw_move.to_be_bytes());
        bytes[10..12].copy_from_slice(&self.weight.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.learn.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; ENTRY_SIZE]) -> Self {
        let [k0, k1, k2, k3, k4, k5, k6, k7, m0, m1, w0, w1, l0, l1, l2, l3] = *bytes;
        Self {
            key: u64::from_be_bytes([k0, k1, k2, k3, k4, k5, k6, k7]),
            raw_move: u16::from_be_bytes([m0, m1]),
            weight: u16::from_be_bytes([w0, w1]),
            learn: u32::from_be_bytes([l0, l1, l2, l3]),
        }
    }

    pub fn book_move(&self) -> BookMove {
        BookMove::decode(self.raw_move)
    }
}

/// A surviving move after filtering and ranking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankedMove {
    pub mv: BookMove,
    pub weight: u32,
    pub learn: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    pub positions: usize,
    pub entries: usize,
}

/// Filters, ranks and caps the candidates of each position, then serializes them.
#[derive(Clone, Copy, Debug)]
pub struct BookEncoder {
    pub max_variations: usize,
    pub min_wins: u64,
}

impl BookEncoder {
    pub fn new(max_variations: usize, min_wins: u64) -> Self {
        Self { max_variations, min_wins }
    }

    /// A move is published when `wins >= max(min_wins, losses)`.
    pub fn qualifies(&self, candidate: &Candidate) -> bool {
        candidate.stats.win >= self.min_wins.max(candidate.stats.loss)
    }

    /// Surviving moves of one position, best first.
    pub fn rank(&self, candidates: &[Candidate]) -> Vec<RankedMove> {
        let mut moves: Vec<&Candidate> = candidates.iter().filter(|c| self.qualifies(c)).collect();
        // stable: ties keep first-seen order
        moves.sort_by(|a, b| compare_rank(b, a));
        moves.truncate(self.max_variations);
        moves
            .into_iter()
            .map(|c| RankedMove {
                mv: c.mv,
                weight: weight(c.stats.win),
                learn: log2(c.stats.loss),
            })
            .collect()
    }

    /// All positions in ascending key order, with their ranked moves.
    /// Positions left without moves are dropped.
    pub fn ranked<'a, K: PositionKey>(&self, table: &'a PositionTable<K>) -> Vec<(&'a K, Vec<RankedMove>)> {
        table
            .sorted_keys()
            .into_iter()
            .filter_map(|key| {
                let moves = self.rank(table.get(key).unwrap_or_default());
                (!moves.is_empty()).then_some((key, moves))
            })
            .collect()
    }

    pub fn write<K: PositionKey, W: Write>(
        &self,
        table: &PositionTable<K>,
        format: OutputFormat,
        out: &mut W,
    ) -> BookResult<EncodeSummary> {
        match format {
            OutputFormat::Bin => self.write_binary(table, out),
            OutputFormat::Csv => self.write_text(table, out),
        }
    }

    pub fn write_binary<K: PositionKey, W: Write>(
        &self,
        table: &PositionTable<K>,
        out: &mut W,
    ) -> BookResult<EncodeSummary> {
        let mut summary = EncodeSummary::default();
        for (key, moves) in self.ranked(table) {
            let key = key.as_u64().ok_or(BookError::UnsupportedKey)?;
            for m in &moves {
                let entry = BookEntry::new(key, &m.mv, m.weight, m.learn)?;
                out.write_all(&entry.to_bytes()).map_err(output_error)?;
                summary.entries += 1;
            }
            summary.positions += 1;
        }
        Ok(summary)
    }

    pub fn write_text<K: PositionKey, W: Write>(
        &self,
        table: &PositionTable<K>,
        out: &mut W,
    ) -> BookResult<EncodeSummary> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
        let mut summary = EncodeSummary::default();
        for (key, moves) in self.ranked(table) {
            let mut record = vec![key.to_text()];
            for m in &moves {
                if m.weight == 0 {
                    return Err(BookError::InvalidWeight { weight: 0, stored: 0 });
                }
                record.extend([m.mv.to_string(), m.weight.to_string(), m.learn.to_string()]);
                summary.entries += 1;
            }
            writer.write_record(&record).map_err(|e| output_error(e.into()))?;
            summary.positions += 1;
        }
        writer.flush().map_err(output_error)?;
        Ok(summary)
    }

    /// Encodes the whole book into memory.
    pub fn encode<K: PositionKey>(&self, table: &PositionTable<K>, format: OutputFormat) -> BookResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write(table, format, &mut bytes)?;
        Ok(bytes)
    }
}

/// Win ratio first (losses floored at one), then raw wins.
fn compare_rank(a: &Candidate, b: &Candidate) -> Ordering {
    let lhs = u128::from(a.stats.win) * u128::from(b.stats.loss.max(1));
    let rhs = u128::from(b.stats.win) * u128::from(a.stats.loss.max(1));
    lhs.cmp(&rhs).then(a.stats.win.cmp(&b.stats.win))
}

fn log2(n: u64) -> u32 {
    if n == 0 {
        0
    } else {
        63 - n.leading_zeros()
    }
}

fn weight(wins: u64) -> u32 {
    log2(wins).max(1)
}

fn output_error(source: io::Error) -> BookError {
    BookError::io("<book output>", source)
}

/// Reads a binary book back into records.
pub fn read_book<R: Read>(mut input: R) -> io::Result<Vec<BookEntry>> {
    let mut entries = Vec::new();
    let mut buf = [0u8; ENTRY_SIZE];
    loop {
        match input.read_exact(&mut buf) {
            Ok(()) => entries.push(BookEntry::from_bytes(&buf)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }
    Ok(entries)
}
