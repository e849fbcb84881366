// Stat harvest pipeline: fetch record tables, parse them, merge per-player
// lines, score, and persist.

pub mod fetch;
pub mod merge;
pub mod runner;
pub mod score;
pub mod table;
