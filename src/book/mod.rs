// src/book/mod.rs

pub mod codec;
pub mod encoder;
pub mod key;
pub mod stats;

pub use codec::BookMove;
pub use encoder::{read_book, BookEncoder, BookEntry, EncodeSummary, OutputFormat};
pub use key::PositionKey;
pub use stats::{Candidate, GameResult, MoveStats, PositionTable};
