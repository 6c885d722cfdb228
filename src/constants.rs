// Ingestion
pub const DEFAULT_DEPTH: u32 = 40; // plies
pub const DEFAULT_EXCLUDED_EVENTS: [&str; 2] = ["blitz", "bullet"];

// Book
pub const DEFAULT_MAX_VARIATIONS: usize = 5;
pub const MAX_VARIATIONS_CAP: usize = 5; // keeps the file size reasonable
pub const DEFAULT_MIN_WINS: u64 = 2;

// Observation increments, relative to the side that moved
pub const WIN_INCREMENT: u64 = 2;
pub const LOSS_INCREMENT: u64 = 2;
pub const DRAW_INCREMENT: u64 = 1;

// Polyglot entry layout: key u64, move u16, weight u16, learn u32 (big endian)
pub const ENTRY_SIZE: usize = 16;
pub const FIELD_MODULUS: u32 = 65535;

// Files
pub const PGN_EXTENSION: &str = "pgn";
pub const GZIP_EXTENSION: &str = "gz";
