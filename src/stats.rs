// Stat categories and player stat lines flowing through the harvest pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// The four records tables that feed the pipeline. Each is fetched and
/// parsed independently; a failure in one never blocks the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Runs,
    Wickets,
    Dismissals,
    Catches,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Runs,
        Category::Wickets,
        Category::Dismissals,
        Category::Catches,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Runs => "runs",
            Category::Wickets => "wickets",
            Category::Dismissals => "dismissals",
            Category::Catches => "catches",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Per-category records
// ---------------------------------------------------------------------------

/// One row of the batting (most runs) table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattingRecord {
    pub player: String,
    pub team: String,
    pub matches: u32,
    pub runs: u32,
    pub hundreds: u32,
    pub fifties: u32,
    pub ducks: u32,
    pub fours: u32,
    pub sixes: u32,
}

/// One row of the bowling (most wickets) table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BowlingRecord {
    pub player: String,
    pub team: String,
    pub maidens: u32,
    pub wickets: u32,
    pub four_wkts: u32,
    pub five_wkts: u32,
}

/// One row of the wicket-keeping (most dismissals) table. Keeper catches
/// are kept apart from outfield catches; both score, under different keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepingRecord {
    pub player: String,
    pub team: String,
    pub keeper_catches: u32,
    pub stumpings: u32,
}

/// One row of the fielding (most catches) table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldingRecord {
    pub player: String,
    pub team: String,
    pub catches: u32,
}

/// A parsed row from any of the four tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryRecord {
    Runs(BattingRecord),
    Wickets(BowlingRecord),
    Dismissals(KeepingRecord),
    Catches(FieldingRecord),
}

impl CategoryRecord {
    pub fn category(&self) -> Category {
        match self {
            CategoryRecord::Runs(_) => Category::Runs,
            CategoryRecord::Wickets(_) => Category::Wickets,
            CategoryRecord::Dismissals(_) => Category::Dismissals,
            CategoryRecord::Catches(_) => Category::Catches,
        }
    }

    pub fn player(&self) -> &str {
        match self {
            CategoryRecord::Runs(r) => &r.player,
            CategoryRecord::Wickets(r) => &r.player,
            CategoryRecord::Dismissals(r) => &r.player,
            CategoryRecord::Catches(r) => &r.player,
        }
    }

    pub fn team(&self) -> &str {
        match self {
            CategoryRecord::Runs(r) => &r.team,
            CategoryRecord::Wickets(r) => &r.team,
            CategoryRecord::Dismissals(r) => &r.team,
            CategoryRecord::Catches(r) => &r.team,
        }
    }
}

// ---------------------------------------------------------------------------
// Merged stat lines
// ---------------------------------------------------------------------------

/// Full scraped stat line for one player, summed across every table they
/// appear in. Counters a player has no source row for stay zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedStats {
    pub player: String,
    pub team: String,
    pub matches: u32,
    pub runs: u32,
    pub hundreds: u32,
    pub fifties: u32,
    pub fours: u32,
    pub sixes: u32,
    pub wickets: u32,
    pub four_wkts: u32,
    pub five_wkts: u32,
    pub catches: u32,
    pub stumpings: u32,
    pub ducks: u32,
    pub keeper_catches: u32,
    pub maidens: u32,
}

impl MergedStats {
    /// A zeroed stat line carrying only identity. The team comes from the
    /// first record seen for the player and is never overwritten.
    pub fn new(player: impl Into<String>, team: impl Into<String>) -> Self {
        MergedStats {
            player: player.into(),
            team: team.into(),
            matches: 0,
            runs: 0,
            hundreds: 0,
            fifties: 0,
            fours: 0,
            sixes: 0,
            wickets: 0,
            four_wkts: 0,
            five_wkts: 0,
            catches: 0,
            stumpings: 0,
            ducks: 0,
            keeper_catches: 0,
            maidens: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Manual overrides and scored output
// ---------------------------------------------------------------------------

/// Operator-entered counters with no scrapeable source. These live only in
/// the database; harvest runs read them, fold them into the score, and must
/// never write them back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualOverrides {
    pub three_wkts: u32,
    pub indirect: u32,
    pub direct: u32,
}

/// A merged stat line with manual counters folded in and points computed.
/// This is the shape the persister writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPlayer {
    pub stats: MergedStats,
    pub manual: ManualOverrides,
    pub total_points: f64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
