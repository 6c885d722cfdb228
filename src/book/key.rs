// src/book/key.rs

use shakmaty::fen::Fen;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{Chess, EnPassantMode};
use std::fmt::Debug;
use std::hash::Hash;

/// Identity of a board configuration inside a position table.
///
/// Two positions with the same placement, side to move, castling rights and
/// legal en passant square produce the same key.
pub trait PositionKey: Clone + Ord + Hash + Debug + Send + Sync {
    fn of(pos: &Chess) -> Self;

    /// The 64-bit form used by binary books, if the key has one.
    fn as_u64(&self) -> Option<u64>;

    /// Text form for delimited output. Sorts the same way as the key.
    fn to_text(&self) -> String;
}

/// Polyglot Zobrist hash.
impl PositionKey for u64 {
    fn of(pos: &Chess) -> Self {
        pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
    }

    fn as_u64(&self) -> Option<u64> {
        Some(*self)
    }

    fn to_text(&self) -> String {
        format!("{self:016x}")
    }
}

/// FEN without the move counters.
impl PositionKey for String {
    fn of(pos: &Chess) -> Self {
        let fen = Fen::from_position(pos, EnPassantMode::Legal).to_string();
        fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
    }

    fn as_u64(&self) -> Option<u64> {
        None
    }

    fn to_text(&self) -> String {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::{san::San, Position};

    fn play(sans: &[&str]) -> Chess {
        let mut pos = Chess::default();
        for s in sans {
            let m = s.parse::<San>().unwrap().to_move(&pos).unwrap();
            pos.play_unchecked(m);
        }
        pos
    }

    #[test]
    fn test_starting_position_polyglot_key() {
        assert_eq!(u64::of(&Chess::default()), 0x463b96181691fc9c);
    }

    #[test]
    fn test_transpositions_share_a_key() {
        let a = play(&["Nf3", "Nf6", "Nc3"]);
        let b = play(&["Nc3", "Nf6", "Nf3"]);
        assert_eq!(u64::of(&a), u64::of(&b));
        assert_eq!(String::of(&a), String::of(&b));
    }

    #[test]
    fn test_fen_key_drops_counters() {
        let key = String::of(&Chess::default());
        assert_eq!(key, "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -");
    }

    #[test]
    fn test_hex_text_sorts_numerically() {
        let small: u64 = 0xff;
        let large: u64 = 0x1_0000;
        assert!(small.to_text() < large.to_text());
    }
}
