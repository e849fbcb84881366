// Combines per-category records into one stat line per player.

use crate::stats::{CategoryRecord, MergedStats};
use std::collections::BTreeMap;

/// Fold category records into per-player stat lines, keyed by the display
/// identity exactly as the tables print it ("Initials Surname (CC)").
/// Counters sum across tables, so an all-rounder's batting and bowling rows
/// land on the same line; the team label comes from the first record seen.
/// Output is sorted by identity, so the same records always persist in the
/// same order no matter how the category fetches interleaved.
pub fn merge_records(records: &[CategoryRecord]) -> Vec<MergedStats> {
    let mut by_player: BTreeMap<String, MergedStats> = BTreeMap::new();

    for record in records {
        let line = by_player
            .entry(record.player().to_string())
            .or_insert_with(|| MergedStats::new(record.player(), record.team()));

        match record {
            CategoryRecord::Runs(r) => {
                line.matches += r.matches;
                line.runs += r.runs;
                line.hundreds += r.hundreds;
                line.fifties += r.fifties;
                line.ducks += r.ducks;
                line.fours += r.fours;
                line.sixes += r.sixes;
            }
            CategoryRecord::Wickets(r) => {
                line.maidens += r.maidens;
                line.wickets += r.wickets;
                line.four_wkts += r.four_wkts;
                line.five_wkts += r.five_wkts;
            }
            CategoryRecord::Dismissals(r) => {
                line.keeper_catches += r.keeper_catches;
                line.stumpings += r.stumpings;
            }
            CategoryRecord::Catches(r) => {
                line.catches += r.catches;
            }
        }
    }

    by_player.into_values().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
