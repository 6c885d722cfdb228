// src/pgn/mod.rs

use crate::book::GameResult;
use crate::players::PlayerName;
use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, Move, Position};
use std::io::{self, Read};
use std::ops::ControlFlow;
use tracing::trace;

/// Per-side results for a `Result` tag, as (white, black).
pub fn parse_result(tag: &str) -> Option<(GameResult, GameResult)> {
    use GameResult::{Draw, Loss, Win};
    match tag.trim() {
        "1/2" | "1/2-1/2" | "1/2 1/2" => Some((Draw, Draw)),
        "1-0" | "1-O" | "+/-" | "(+)-(-)" | "1-0 ff" => Some((Win, Loss)),
        "0-1" | "O-1" | "-/+" | "(-)-(+)" | "0-1 ff" => Some((Loss, Win)),
        _ => None,
    }
}

/// Splits `"<event> Round: <round>"` into its parts.
pub fn split_event(event: &str) -> (String, Option<String>) {
    match event.split_once("Round:") {
        Some((name, round)) => (name.trim().to_string(), Some(round.trim().to_string())),
        None => (event.trim().to_string(), None),
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub name: PlayerName,
    pub result: GameResult,
}

/// A validated game: players, event and the mainline from the start position.
#[derive(Clone, Debug)]
pub struct GameRecord {
    pub white: Player,
    pub black: Player,
    pub event: Option<String>,
    pub round: Option<String>,
    pub start: Chess,
    pub moves: Vec<Move>,
}

impl GameRecord {
    pub fn player(&self, color: Color) -> &Player {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

/// Why a record was dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    MissingTag(&'static str),
    UnknownResult(String),
    BadSetup,
    IllegalMove(String),
    ResultMismatch,
    NoMoves,
}

#[derive(Default)]
pub struct GameTags {
    white: Option<String>,
    black: Option<String>,
    result: Option<String>,
    event: Option<String>,
    round: Option<String>,
    fen: Option<String>,
}

pub struct Movetext {
    header: Result<Header, SkipReason>,
    pos: Chess,
    moves: Vec<Move>,
    error: Option<SkipReason>,
    finished: bool,
}

struct Header {
    white: Player,
    black: Player,
    event: Option<String>,
    round: Option<String>,
    start: Chess,
}

/// Visitor that turns one PGN game into a `GameRecord`, checking every move.
#[derive(Default)]
pub struct GameCollector;

impl GameCollector {
    fn header(tags: GameTags) -> Result<Header, SkipReason> {
        let white = tags.white.ok_or(SkipReason::MissingTag("White"))?;
        let black = tags.black.ok_or(SkipReason::MissingTag("Black"))?;
        let result = tags.result.ok_or(SkipReason::MissingTag("Result"))?;
        let (white_result, black_result) =
            parse_result(&result).ok_or_else(|| SkipReason::UnknownResult(result.clone()))?;

        let start = match tags.fen {
            Some(fen) => fen
                .parse::<Fen>()
                .ok()
                .and_then(|f| f.into_position::<Chess>(CastlingMode::Standard).ok())
                .ok_or(SkipReason::BadSetup)?,
            None => Chess::default(),
        };

        let (event, round) = match tags.event {
            Some(event) => {
                let (name, round) = split_event(&event);
                (Some(name), round.or(tags.round))
            }
            None => (None, tags.round),
        };

        Ok(Header {
            white: Player { name: PlayerName::from_tag(&white), result: white_result },
            black: Player { name: PlayerName::from_tag(&black), result: black_result },
            event,
            round,
            start,
        })
    }
}

impl Visitor for GameCollector {
    type Tags = GameTags;
    type Movetext = Movetext;
    type Output = Result<GameRecord, SkipReason>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, GameTags> {
        ControlFlow::Continue(GameTags::default())
    }

    fn tag(&mut self, tags: &mut GameTags, name: &[u8], value: RawTag<'_>) -> ControlFlow<Self::Output> {
        let value = value.decode_utf8_lossy().into_owned();
        match name {
            b"White" => tags.white = Some(value),
            b"Black" => tags.black = Some(value),
            b"Result" => tags.result = Some(value),
            b"Event" => tags.event = Some(value),
            b"Round" => tags.round = Some(value),
            b"FEN" => tags.fen = Some(value),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: GameTags) -> ControlFlow<Self::Output, Movetext> {
        let header = Self::header(tags);
        let pos = header.as_ref().map(|h| h.start.clone()).unwrap_or_default();
        ControlFlow::Continue(Movetext {
            header,
            pos,
            moves: Vec::new(),
            error: None,
            finished: false,
        })
    }

    fn san(&mut self, state: &mut Movetext, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        if state.header.is_err() || state.error.is_some() || state.finished {
            return ControlFlow::Continue(());
        }

        let m = match san_plus.san.to_move(&state.pos) {
            Ok(m) => m,
            Err(_) => {
                state.error = Some(SkipReason::IllegalMove(san_plus.to_string()));
                return ControlFlow::Continue(());
            }
        };
        state.pos.play_unchecked(m);
        state.moves.push(m);

        // The recorded result has to agree with the final position.
        if let Ok(header) = &state.header {
            let to_move = match state.pos.turn() {
                Color::White => header.white.result,
                Color::Black => header.black.result,
            };
            if state.pos.is_checkmate() && to_move != GameResult::Loss {
                state.error = Some(SkipReason::ResultMismatch);
            } else if state.pos.is_stalemate() {
                if header.white.result != GameResult::Draw || header.black.result != GameResult::Draw {
                    state.error = Some(SkipReason::ResultMismatch);
                }
                state.finished = true;
            }
        }
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, _state: &mut Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true)) // mainline only
    }

    fn end_game(&mut self, state: Movetext) -> Self::Output {
        let header = state.header?;
        if let Some(reason) = state.error {
            return Err(reason);
        }
        if state.moves.is_empty() {
            return Err(SkipReason::NoMoves);
        }
        Ok(GameRecord {
            white: header.white,
            black: header.black,
            event: header.event,
            round: header.round,
            start: header.start,
            moves: state.moves,
        })
    }
}

/// Reads games one by one from a PGN stream.
pub struct GameReader<R: Read> {
    reader: Reader<R>,
    collector: GameCollector,
}

impl<R: Read> GameReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::new(input),
            collector: GameCollector,
        }
    }

    /// The next game, `Ok(Some(Err(_)))` for a record that failed validation,
    /// `Ok(None)` at end of input.
    pub fn next_game(&mut self) -> io::Result<Option<Result<GameRecord, SkipReason>>> {
        let game = self.reader.read_game(&mut self.collector)?;
        if let Some(Err(reason)) = &game {
            trace!(?reason, "skipping record");
        }
        Ok(game)
    }
}
