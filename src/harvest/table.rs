// Records-table extraction: raw HTML into typed category records.
//
// The stats pages serve plain <table> markup. The scanner below is
// deliberately small and tailored to that shape: tag names are matched
// case-insensitively, attributes are ignored, and only the first table on
// the page is read.

use crate::stats::{
    BattingRecord, BowlingRecord, Category, CategoryRecord, FieldingRecord, KeepingRecord,
};
use tracing::warn;

// ---------------------------------------------------------------------------
// Column positions
// ---------------------------------------------------------------------------

// Cell positions in the records tables, counted over <td> cells. These track
// the site's column order per category; a layout change upstream surfaces
// here as a burst of anomalies, not a crash.
const COL_PLAYER: usize = 0;
const COL_TEAM: usize = 1;

// batting (most runs)
const BAT_MATCHES: usize = 2;
const BAT_RUNS: usize = 5;
const BAT_HUNDREDS: usize = 10;
const BAT_FIFTIES: usize = 11;
const BAT_DUCKS: usize = 12;
const BAT_FOURS: usize = 13;
const BAT_SIXES: usize = 14;

// bowling (most wickets)
const BOWL_MAIDENS: usize = 6;
const BOWL_WICKETS: usize = 8;
const BOWL_FOUR_WKTS: usize = 13;
const BOWL_FIVE_WKTS: usize = 14;

// keeping (most dismissals)
const KEEP_CATCHES: usize = 5;
const KEEP_STUMPINGS: usize = 6;

// fielding (most catches)
const FIELD_CATCHES: usize = 4;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse outcome for one category table.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub records: Vec<CategoryRecord>,
    /// Count of cells that failed numeric interpretation (coerced to zero)
    /// plus rows dropped for having no player name.
    pub anomalies: u32,
}

/// Extract every data row of the first table in `html` as records of the
/// given category. Never fails: an unrecognizable page simply yields zero
/// records, and each malformed cell is tallied and read as zero.
pub fn parse_category_table(category: Category, html: &str) -> ParsedTable {
    let mut records = Vec::new();
    let mut anomalies = 0u32;

    let Some(table) = slice_between_ci(html, "<table", "</table>") else {
        warn!("{} page contains no <table>, yielding no records", category);
        return ParsedTable { records, anomalies };
    };

    // Data rows live in <tbody> when present; header rows carry only <th>
    // cells and fall out naturally either way.
    let body = slice_between_ci(table, "<tbody", "</tbody>").unwrap_or(table);

    let mut pos = 0usize;
    while let Some((row_start, row_end)) = next_tag_block_ci(body, "<tr", "</tr>", pos) {
        let row = &body[row_start..row_end];
        pos = row_end;

        let cells = row_cells(row);
        if cells.is_empty() {
            continue;
        }
        match record_from_cells(category, &cells, &mut anomalies) {
            Some(record) => records.push(record),
            None => anomalies += 1,
        }
    }

    if anomalies > 0 {
        warn!(
            "{} table: {} malformed cells/rows coerced or dropped",
            category, anomalies
        );
    }

    ParsedTable { records, anomalies }
}

// ---------------------------------------------------------------------------
// Row interpretation
// ---------------------------------------------------------------------------

/// Build one record from a row's cells. Returns None when the player cell
/// is missing or empty; such rows cannot be joined and are dropped.
fn record_from_cells(
    category: Category,
    cells: &[String],
    anomalies: &mut u32,
) -> Option<CategoryRecord> {
    let player = cells.get(COL_PLAYER)?.trim().to_string();
    if player.is_empty() {
        return None;
    }
    let team = cells
        .get(COL_TEAM)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    let record = match category {
        Category::Runs => CategoryRecord::Runs(BattingRecord {
            player,
            team,
            matches: counter_cell(cells, BAT_MATCHES, anomalies),
            runs: counter_cell(cells, BAT_RUNS, anomalies),
            hundreds: counter_cell(cells, BAT_HUNDREDS, anomalies),
            fifties: counter_cell(cells, BAT_FIFTIES, anomalies),
            ducks: counter_cell(cells, BAT_DUCKS, anomalies),
            fours: counter_cell(cells, BAT_FOURS, anomalies),
            sixes: counter_cell(cells, BAT_SIXES, anomalies),
        }),
        Category::Wickets => CategoryRecord::Wickets(BowlingRecord {
            player,
            team,
            maidens: counter_cell(cells, BOWL_MAIDENS, anomalies),
            wickets: counter_cell(cells, BOWL_WICKETS, anomalies),
            four_wkts: counter_cell(cells, BOWL_FOUR_WKTS, anomalies),
            five_wkts: counter_cell(cells, BOWL_FIVE_WKTS, anomalies),
        }),
        Category::Dismissals => CategoryRecord::Dismissals(KeepingRecord {
            player,
            team,
            keeper_catches: counter_cell(cells, KEEP_CATCHES, anomalies),
            stumpings: counter_cell(cells, KEEP_STUMPINGS, anomalies),
        }),
        Category::Catches => CategoryRecord::Catches(FieldingRecord {
            player,
            team,
            catches: counter_cell(cells, FIELD_CATCHES, anomalies),
        }),
    };
    Some(record)
}

/// Read a counter cell. Missing cells and cells with no leading digits are
/// tallied and read as zero, matching how the tables render absent values.
fn counter_cell(cells: &[String], idx: usize, anomalies: &mut u32) -> u32 {
    let value = cells.get(idx).and_then(|raw| leading_number(raw));
    match value {
        Some(n) => n,
        None => {
            *anomalies += 1;
            0
        }
    }
}

/// Parse the leading ASCII-digit run of a cell, so "299*" reads as 299 and
/// "-" reads as nothing.
fn leading_number(s: &str) -> Option<u32> {
    let t = s.trim();
    let end = t
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(t.len());
    if end == 0 {
        return None;
    }
    t[..end].parse().ok()
}

/// All <td> cell texts of a row, in order.
fn row_cells(row: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut pos = 0usize;
    while let Some((start, end)) = next_tag_block_ci(row, "<td", "</td>", pos) {
        cells.push(inner_text(&row[start..end]));
        pos = end;
    }
    cells
}

// ---------------------------------------------------------------------------
// HTML scanning helpers
// ---------------------------------------------------------------------------

/// Byte-wise ASCII case-insensitive substring search starting at `from`.
fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() || from > hay.len() {
        return None;
    }
    let last = hay.len().checked_sub(pat.len())?;
    (from..=last).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

/// Content between an opening tag matching `open_pat` (attributes allowed)
/// and the next occurrence of `close_pat`.
fn slice_between_ci<'a>(s: &'a str, open_pat: &str, close_pat: &str) -> Option<&'a str> {
    let open = find_ci(s, open_pat, 0)?;
    let content = open + s[open..].find('>')? + 1;
    let close = find_ci(s, close_pat, content)?;
    Some(&s[content..close])
}

/// Span of the next complete `<tag ...>...</tag>` block at or after `from`.
fn next_tag_block_ci(s: &str, open_tag: &str, close_tag: &str, from: usize) -> Option<(usize, usize)> {
    let start = find_ci(s, open_tag, from)?;
    let content = start + s[start..].find('>')? + 1;
    let close = find_ci(s, close_tag, content)?;
    Some((start, close + close_tag.len()))
}

/// Visible text of a tag block: wrapping tags removed, nested tags stripped,
/// the common entities decoded, whitespace collapsed.
fn inner_text(block: &str) -> String {
    let open_end = block.find('>').map(|i| i + 1).unwrap_or(0);
    let close_start = block
        .rfind('<')
        .filter(|&i| i >= open_end)
        .unwrap_or(block.len());

    let mut text = String::with_capacity(close_start - open_end);
    let mut in_tag = false;
    for ch in block[open_end..close_start].chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    collapse_ws(&text.replace("&nbsp;", " ").replace("&amp;", "&"))
}

/// Collapse whitespace runs into single spaces and trim.
fn collapse_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = true;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
