// src/book/codec.rs

use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Move, Role, Square};
use std::fmt;

const SQUARE_MASK: u16 = 0x3f;
const PROMOTION_MASK: u16 = 0x7;
const FROM_SHIFT: u16 = 6;
const PROMOTION_SHIFT: u16 = 12;

/// A move as stored in a book: origin, destination and optional promotion.
///
/// Castling is kept in the standard king-to-destination form (`e1g1`), so two
/// `BookMove`s are equal exactly when their UCI text is equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BookMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl BookMove {
    pub fn new(from: Square, to: Square, promotion: Option<Role>) -> Self {
        Self { from, to, promotion }
    }

    /// Converts a legal move. Drops and null moves have no book form.
    pub fn from_move(m: &Move) -> Option<Self> {
        match m.to_uci(CastlingMode::Standard) {
            UciMove::Normal { from, to, promotion } => Some(Self::new(from, to, promotion)),
            _ => None,
        }
    }

    /// Canonical text used to tell moves apart.
    pub fn uci(&self) -> String {
        self.to_string()
    }

    /// Packs the move into the 16-bit Polyglot layout.
    pub fn encode(&self) -> u16 {
        let promotion = self.promotion.map_or(0, promotion_code);
        (self.to as u16)
            | ((self.from as u16) << FROM_SHIFT)
            | ((promotion & PROMOTION_MASK) << PROMOTION_SHIFT)
    }

    pub fn decode(raw: u16) -> Self {
        let to = Square::new(u32::from(raw & SQUARE_MASK));
        let from = Square::new(u32::from((raw >> FROM_SHIFT) & SQUARE_MASK));
        let promotion = promotion_role((raw >> PROMOTION_SHIFT) & PROMOTION_MASK);
        Self { from, to, promotion }
    }
}

impl fmt::Display for BookMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "{}", role.char())?;
        }
        Ok(())
    }
}

// knight = 1 .. queen = 4
fn promotion_code(role: Role) -> u16 {
    match role {
        Role::Knight => 1,
        Role::Bishop => 2,
        Role::Rook => 3,
        Role::Queen => 4,
        // never legal promotions; a pawn reads back as no promotion
        Role::Pawn => 0,
        Role::King => 5,
    }
}

fn promotion_role(code: u16) -> Option<Role> {
    match code {
        1 => Some(Role::Knight),
        2 => Some(Role::Bishop),
        3 => Some(Role::Rook),
        4 => Some(Role::Queen),
        5 => Some(Role::King),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::{fen::Fen, Chess, Position};

    fn parse(uci: &str) -> BookMove {
        match uci.parse::<UciMove>().unwrap() {
            UciMove::Normal { from, to, promotion } => BookMove::new(from, to, promotion),
            other => panic!("unexpected move {other}"),
        }
    }

    #[test]
    fn test_encode_known_moves() {
        // e2 = 12, e4 = 28
        assert_eq!(parse("e2e4").encode(), 28 | (12 << 6));
        // e7 = 52, e8 = 60, queen = 4
        assert_eq!(parse("e7e8q").encode(), 60 | (52 << 6) | (4 << 12));
        assert_eq!(parse("a7a8n").encode() >> 12, 1);
    }

    #[test]
    fn test_round_trip_all_squares_and_promotions() {
        let promotions = [None, Some(Role::Knight), Some(Role::Bishop), Some(Role::Rook), Some(Role::Queen)];
        for from in Square::ALL {
            for to in Square::ALL {
                for promotion in promotions {
                    let m = BookMove::new(from, to, promotion);
                    assert_eq!(BookMove::decode(m.encode()), m);
                }
            }
        }
    }

    #[test]
    fn test_pawn_promotion_reads_back_as_none() {
        let m = BookMove::new(Square::E7, Square::E8, Some(Role::Pawn));
        assert_eq!(m.encode(), BookMove::new(Square::E7, Square::E8, None).encode());
        assert_eq!(BookMove::decode(m.encode()).promotion, None);
    }

    #[test]
    fn test_castling_uses_king_destination() {
        let fen: Fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let pos: Chess = fen.into_position(shakmaty::CastlingMode::Standard).unwrap();
        let castle = pos
            .legal_moves()
            .into_iter()
            .find(|m| m.is_castle() && m.to() == Square::H1)
            .unwrap();
        let book_move = BookMove::from_move(&castle).unwrap();
        assert_eq!(book_move.uci(), "e1g1");
    }

    #[test]
    fn test_display_is_uci() {
        assert_eq!(parse("g7g8r").to_string(), "g7g8r");
        assert_eq!(parse("b1c3").uci(), "b1c3");
    }
}
