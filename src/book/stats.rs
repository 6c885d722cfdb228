// src/book/stats.rs

use super::codec::BookMove;
use super::key::PositionKey;
use crate::constants::{DRAW_INCREMENT, LOSS_INCREMENT, WIN_INCREMENT};
use std::collections::HashMap;

/// Result of a game from the point of view of the side that moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveStats {
    pub win: u64,
    pub loss: u64,
    /// Shallowest ply at which the move was seen.
    pub depth: u32,
}

impl MoveStats {
    /// A draw counts as half a win and never as a loss.
    pub fn from_result(result: GameResult, depth: u32) -> Self {
        let (win, loss) = match result {
            GameResult::Win => (WIN_INCREMENT, 0),
            GameResult::Loss => (0, LOSS_INCREMENT),
            GameResult::Draw => (DRAW_INCREMENT, 0),
        };
        Self { win, loss, depth }
    }

    fn absorb(&mut self, other: &MoveStats) {
        self.win += other.win;
        self.loss += other.loss;
        self.depth = self.depth.min(other.depth);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub mv: BookMove,
    pub stats: MoveStats,
}

/// Candidate moves per position, keyed by position identity.
///
/// Moves within one position are unique and kept in first-seen order.
#[derive(Clone, Debug)]
pub struct PositionTable<K: PositionKey> {
    positions: HashMap<K, Vec<Candidate>>,
}

impl<K: PositionKey> Default for PositionTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PositionKey> PositionTable<K> {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
        }
    }

    pub fn observe(&mut self, key: K, mv: BookMove, result: GameResult, depth: u32) {
        self.insert(key, Candidate { mv, stats: MoveStats::from_result(result, depth) });
    }

    /// Adds a candidate, summing it into an existing entry for the same move.
    pub fn insert(&mut self, key: K, candidate: Candidate) {
        add_candidate(self.positions.entry(key).or_default(), candidate);
    }

    /// Folds `other` into this table and leaves `other` empty.
    pub fn merge(&mut self, other: &mut PositionTable<K>) {
        for (key, candidates) in other.positions.drain() {
            match self.positions.get_mut(&key) {
                Some(existing) => {
                    for candidate in candidates {
                        add_candidate(existing, candidate);
                    }
                }
                None => {
                    self.positions.insert(key, candidates);
                }
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&[Candidate]> {
        self.positions.get(key).map(Vec::as_slice)
    }

    /// Position keys in ascending order.
    pub fn sorted_keys(&self) -> Vec<&K> {
        let mut keys: Vec<&K> = self.positions.keys().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn move_count(&self) -> usize {
        self.positions.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }
}

fn add_candidate(candidates: &mut Vec<Candidate>, candidate: Candidate) {
    match candidates.iter_mut().find(|c| c.mv == candidate.mv) {
        Some(existing) => existing.stats.absorb(&candidate.stats),
        None => candidates.push(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use shakmaty::Square;

    fn mv(from: Square, to: Square) -> BookMove {
        BookMove::new(from, to, None)
    }

    fn snapshot(table: &PositionTable<u64>) -> Vec<(u64, Vec<(String, u64, u64, u32)>)> {
        table
            .sorted_keys()
            .into_iter()
            .map(|key| {
                let mut moves: Vec<_> = table
                    .get(key)
                    .unwrap()
                    .iter()
                    .map(|c| (c.mv.uci(), c.stats.win, c.stats.loss, c.stats.depth))
                    .collect();
                moves.sort();
                (*key, moves)
            })
            .collect()
    }

    #[test]
    fn test_result_increments() {
        assert_eq!(MoveStats::from_result(GameResult::Win, 0), MoveStats { win: 2, loss: 0, depth: 0 });
        assert_eq!(MoveStats::from_result(GameResult::Loss, 3), MoveStats { win: 0, loss: 2, depth: 3 });
        assert_eq!(MoveStats::from_result(GameResult::Draw, 5), MoveStats { win: 1, loss: 0, depth: 5 });
    }

    #[test]
    fn test_same_move_is_deduplicated() {
        let mut table = PositionTable::<u64>::new();
        table.observe(1, mv(Square::E2, Square::E4), GameResult::Win, 4);
        table.observe(1, mv(Square::E2, Square::E4), GameResult::Loss, 2);

        let candidates = table.get(&1).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].stats, MoveStats { win: 2, loss: 2, depth: 2 });
    }

    #[test]
    fn test_promotions_are_distinct_moves() {
        let mut table = PositionTable::<u64>::new();
        let queen = BookMove::new(Square::E7, Square::E8, Some(shakmaty::Role::Queen));
        let knight = BookMove::new(Square::E7, Square::E8, Some(shakmaty::Role::Knight));
        table.observe(9, queen, GameResult::Win, 0);
        table.observe(9, knight, GameResult::Win, 0);
        assert_eq!(table.get(&9).unwrap().len(), 2);
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let mut table = PositionTable::<u64>::new();
        table.observe(7, mv(Square::D2, Square::D4), GameResult::Draw, 0);
        table.observe(7, mv(Square::E2, Square::E4), GameResult::Win, 0);
        table.observe(7, mv(Square::D2, Square::D4), GameResult::Win, 0);
        let order: Vec<_> = table.get(&7).unwrap().iter().map(|c| c.mv.uci()).collect();
        assert_eq!(order, ["d2d4", "e2e4"]);
    }

    #[test]
    fn test_merge_empties_source() {
        let mut global = PositionTable::<u64>::new();
        let mut scratch = PositionTable::<u64>::new();
        scratch.observe(1, mv(Square::G1, Square::F3), GameResult::Win, 0);
        global.merge(&mut scratch);
        assert!(scratch.is_empty());
        assert_eq!(global.move_count(), 1);
    }

    #[test]
    fn test_merge_grouping_and_order_do_not_matter() {
        let moves = [
            mv(Square::E2, Square::E4),
            mv(Square::D2, Square::D4),
            mv(Square::C2, Square::C4),
            mv(Square::G1, Square::F3),
        ];
        let results = [GameResult::Win, GameResult::Loss, GameResult::Draw];
        let mut observations = Vec::new();
        for i in 0..300u32 {
            let key = u64::from(i % 7);
            observations.push((key, moves[(i % 4) as usize], results[(i % 3) as usize], i % 11));
        }

        let build = |obs: &[(u64, BookMove, GameResult, u32)]| {
            let mut table = PositionTable::<u64>::new();
            for &(key, m, result, depth) in obs {
                table.observe(key, m, result, depth);
            }
            table
        };

        // One table with everything.
        let expected = snapshot(&build(&observations));

        // Three partial tables merged in different groupings and orders.
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..5 {
            let mut shuffled = observations.clone();
            shuffled.shuffle(&mut rng);
            let (a, rest) = shuffled.split_at(100);
            let (b, c) = rest.split_at(120);

            let mut left = PositionTable::new();
            left.merge(&mut build(a));
            left.merge(&mut build(b));
            left.merge(&mut build(c));

            let mut bc = build(b);
            bc.merge(&mut build(c));
            let mut right = build(a);
            right.merge(&mut bc);

            assert_eq!(snapshot(&left), expected);
            assert_eq!(snapshot(&right), expected);
        }
    }

    #[test]
    fn test_sorted_keys_are_ascending() {
        let mut table = PositionTable::<u64>::new();
        for key in [u64::MAX, 3, 0x8000_0000_0000_0000, 1] {
            table.observe(key, mv(Square::A2, Square::A3), GameResult::Win, 0);
        }
        let keys: Vec<u64> = table.sorted_keys().into_iter().copied().collect();
        assert_eq!(keys, [1, 3, 0x8000_0000_0000_0000, u64::MAX]);
    }
}
