// src/players/mod.rs

use crate::error::{BookError, BookResult};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// A player name split into last name and first name (possibly an initial or empty).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlayerName {
    pub last: String,
    pub first: String,
}

impl PlayerName {
    pub fn new(last: impl Into<String>, first: impl Into<String>) -> Self {
        Self {
            last: last.into(),
            first: first.into(),
        }
    }

    pub fn last_only(last: impl Into<String>) -> Self {
        Self::new(last, "")
    }

    /// Parses a PGN name tag: `"Last, First Middle"` or `"First Middle Last"`.
    /// Tokens are capitalized; middle names go into the first name.
    pub fn from_tag(raw: &str) -> Self {
        let (last, first): (Vec<&str>, Vec<&str>) = match raw.split_once(',') {
            Some((last, rest)) => {
                let mut parts = rest.split(',');
                let mut first: Vec<&str> = parts.next().unwrap_or("").split_whitespace().collect();
                // "Last, First, Middle"
                first.extend(parts.flat_map(str::split_whitespace));
                (last.split_whitespace().collect(), first)
            }
            None => {
                let tokens: Vec<&str> = raw.split_whitespace().collect();
                match tokens.split_last() {
                    Some((last, first)) => (vec![*last], first.to_vec()),
                    None => (Vec::new(), Vec::new()),
                }
            }
        };
        Self::new(capitalize(&last), capitalize(&first))
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty() && self.first.is_empty()
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first.is_empty() {
            write!(f, "{}", self.last)
        } else {
            write!(f, "{}, {}", self.last, self.first)
        }
    }
}

fn capitalize(tokens: &[&str]) -> String {
    tokens
        .iter()
        .map(|t| {
            let lower = t.trim().to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased last name and first-name initial, as compared by the filter.
#[derive(Clone, Debug, PartialEq, Eq)]
struct NormalizedName {
    last: String,
    initial: Option<char>,
}

impl NormalizedName {
    fn new(last: &str, first: &str) -> Self {
        Self {
            last: last.trim().trim_end_matches('.').to_lowercase(),
            initial: first
                .chars()
                .find(|c| c.is_alphabetic())
                .and_then(|c| c.to_lowercase().next()),
        }
    }
}

/// An allow-list entry: a last name and an optional first-name initial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedPattern {
    last: String,
    initial: Option<char>,
}

impl RankedPattern {
    pub fn new(last: &str, first: &str) -> Self {
        let name = NormalizedName::new(last, first);
        Self {
            last: name.last,
            initial: name.initial,
        }
    }

    /// Last names must be equal. When both sides carry a first name, their
    /// initials must agree; a missing first name on either side matches anything.
    fn matches(&self, name: &NormalizedName) -> bool {
        if self.last != name.last {
            return false;
        }
        match (self.initial, name.initial) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => true,
        }
    }
}

/// Parses a ranked-players list: one `last,first` CSV row per line.
///
/// Blank lines and `#` comments are skipped. The first name is optional.
pub fn parse_ranked(text: &str) -> BookResult<Vec<RankedPattern>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut patterns = Vec::new();
    for row in reader.records() {
        let row = row?;
        let last = row.get(0).unwrap_or("");
        let first = row.get(1).unwrap_or("");
        if last.is_empty() {
            return Err(BookError::RankedEntry {
                line: row.position().map_or(0, |p| p.line() as usize),
                text: row.iter().collect::<Vec<_>>().join(","),
            });
        }
        patterns.push(RankedPattern::new(last, first));
    }
    Ok(patterns)
}

pub fn read_ranked(path: &Path) -> BookResult<Vec<RankedPattern>> {
    let text = fs::read_to_string(path).map_err(|e| BookError::io(path, e))?;
    parse_ranked(&text)
}

type AuditSink = Box<dyn Write + Send>;

/// Decides whether a player's games count toward the book.
///
/// Without an allow-list every player is relevant. Decisions are cached per
/// name as given, and the first decision for each name is logged.
pub struct RelevanceFilter {
    patterns: Option<Vec<RankedPattern>>,
    cache: Mutex<HashMap<PlayerName, bool>>,
    audit: Option<Mutex<AuditSink>>,
}

impl RelevanceFilter {
    pub fn new(patterns: Option<Vec<RankedPattern>>) -> Self {
        Self {
            patterns,
            cache: Mutex::new(HashMap::new()),
            audit: None,
        }
    }

    pub fn everyone() -> Self {
        Self::new(None)
    }

    /// Also writes `+ name` / `- name` lines to `sink` for each new decision.
    pub fn with_audit(mut self, sink: AuditSink) -> Self {
        self.audit = Some(Mutex::new(sink));
        self
    }

    pub fn is_relevant(&self, name: &PlayerName) -> bool {
        let Some(patterns) = &self.patterns else {
            return true;
        };

        if let Some(&cached) = self.cache.lock().unwrap().get(name) {
            return cached;
        }

        let relevant = resolve(patterns, name);
        let first_time = self.cache.lock().unwrap().insert(name.clone(), relevant).is_none();
        if first_time {
            self.record(name, relevant);
        }
        relevant
    }

    fn record(&self, name: &PlayerName, relevant: bool) {
        debug!(target: "mkbook::relevance", player = %name, relevant, "resolved player");
        if let Some(audit) = &self.audit {
            let mark = if relevant { '+' } else { '-' };
            let mut sink = audit.lock().unwrap();
            if let Err(e) = writeln!(sink, "{mark} {name}") {
                debug!(target: "mkbook::relevance", "audit log write failed: {e}");
            }
        }
    }

    /// Number of distinct names resolved so far.
    pub fn resolved(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn flush_audit(&self) {
        if let Some(audit) = &self.audit {
            let _ = audit.lock().unwrap().flush();
        }
    }
}

// Names may be recorded as (first, last) too.
fn resolve(patterns: &[RankedPattern], name: &PlayerName) -> bool {
    let direct = NormalizedName::new(&name.last, &name.first);
    if patterns.iter().any(|p| p.matches(&direct)) {
        return true;
    }
    if name.first.trim().is_empty() {
        return false;
    }
    let reversed = NormalizedName::new(&name.first, &name.last);
    patterns.iter().any(|p| p.matches(&reversed))
}
