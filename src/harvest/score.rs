// Point computation: the multiplier sheet applied to merged stat lines.

use crate::config::RoleSheet;
use crate::stats::{ManualOverrides, MergedStats, ScoredPlayer};
use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Multiplier sheet
// ---------------------------------------------------------------------------

// Points per unit of each counter. Matches are tracked but never scored.
const RUNS: f64 = 1.0;
const FIFTIES: f64 = 5.0;
const CENTURIES: f64 = 10.0;
const SIXES: f64 = 2.0;
const FOURS: f64 = 1.0;
const WICKETS: f64 = 25.0;
const FOUR_WKTS: f64 = 10.0;
const FIVE_WKTS: f64 = 12.0;
const CATCHES: f64 = 8.0;
const STUMPINGS: f64 = 12.0;
const DUCKS: f64 = -3.0;
const MAIDENS: f64 = 5.0;
const KEEPER_CATCHES: f64 = 8.0;

// Manual counters (no scrapeable source).
const THREE_WKT_HAULS: f64 = 4.0;
const INDIRECT_HITS: f64 = 6.0;
const DIRECT_HITS: f64 = 12.0;

const CAPTAIN_FACTOR: f64 = 2.0;
const VICE_CAPTAIN_FACTOR: f64 = 1.5;

// ---------------------------------------------------------------------------
// Scoring engine
// ---------------------------------------------------------------------------

/// Applies the multiplier sheet plus the captaincy factors of one role
/// sheet version. Built once per harvest run so every total in a batch is
/// computed under the same sheet.
pub struct ScoringEngine {
    captains: HashSet<String>,
    vice_captains: HashSet<String>,
    version: String,
}

impl ScoringEngine {
    pub fn new(roles: &RoleSheet) -> Self {
        ScoringEngine {
            captains: roles.captains.iter().cloned().collect(),
            vice_captains: roles.vice_captains.iter().cloned().collect(),
            version: roles.version.clone(),
        }
    }

    /// The role sheet version this engine's totals are computed under.
    pub fn roles_version(&self) -> &str {
        &self.version
    }

    /// Total points for one stat line with its manual counters folded in.
    /// The captaincy factor scales the whole total, manual counters
    /// included; captain takes precedence over vice-captain.
    pub fn total_points(&self, stats: &MergedStats, manual: &ManualOverrides) -> f64 {
        let mut points = f64::from(stats.runs) * RUNS
            + f64::from(stats.fifties) * FIFTIES
            + f64::from(stats.hundreds) * CENTURIES
            + f64::from(stats.sixes) * SIXES
            + f64::from(stats.fours) * FOURS
            + f64::from(stats.wickets) * WICKETS
            + f64::from(stats.four_wkts) * FOUR_WKTS
            + f64::from(stats.five_wkts) * FIVE_WKTS
            + f64::from(stats.catches) * CATCHES
            + f64::from(stats.stumpings) * STUMPINGS
            + f64::from(stats.ducks) * DUCKS
            + f64::from(stats.maidens) * MAIDENS
            + f64::from(stats.keeper_catches) * KEEPER_CATCHES;

        points += f64::from(manual.three_wkts) * THREE_WKT_HAULS
            + f64::from(manual.indirect) * INDIRECT_HITS
            + f64::from(manual.direct) * DIRECT_HITS;

        if self.captains.contains(&stats.player) {
            points *= CAPTAIN_FACTOR;
        } else if self.vice_captains.contains(&stats.player) {
            points *= VICE_CAPTAIN_FACTOR;
        }

        points
    }

    /// Score a whole merged batch. Each line picks up its manual counters
    /// by identity; players with no stored counters score on scraped stats
    /// alone.
    pub fn score_all(
        &self,
        lines: Vec<MergedStats>,
        overrides: &HashMap<String, ManualOverrides>,
    ) -> Vec<ScoredPlayer> {
        lines
            .into_iter()
            .map(|stats| {
                let manual = overrides.get(&stats.player).copied().unwrap_or_default();
                let total_points = self.total_points(&stats, &manual);
                ScoredPlayer {
                    stats,
                    manual,
                    total_points,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
