// Auction domain types and the player catalog loader. The transactional
// state transitions themselves live on `Database`; this module defines what
// they exchange and what can go wrong.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Errors from live auction state transitions.
#[derive(Debug, Error)]
pub enum AuctionError {
    #[error("player {id} is not the current live player")]
    NotLive { id: i64 },

    #[error("player {id} is currently live; close the sale on the live player instead")]
    CurrentlyLive { id: i64 },

    #[error("player {id} is not in the auction catalog")]
    UnknownPlayer { id: i64 },

    #[error("player {id} has already been sold")]
    AlreadySold { id: i64 },

    #[error("bid {amount} is below the base bid {basebid}")]
    BidBelowBase { amount: i64, basebid: i64 },

    #[error("auction storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Errors loading the player catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse catalog CSV: {0}")]
    CsvParse(#[from] csv::Error),

    #[error("catalog file contains no usable rows")]
    Empty,
}

/// One row of the catalog file, before validation.
#[derive(Debug, Deserialize)]
struct RawCatalogRow {
    name: String,
    team: String,
    role: String,
    basebid: i64,
}

/// A validated catalog entry ready for import.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub team: String,
    pub role: String,
    pub basebid: i64,
}

/// A full catalog row as stored, including auction state.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPlayer {
    pub id: i64,
    pub name: String,
    pub team: String,
    pub role: String,
    pub basebid: i64,
    pub sold: Option<bool>,
    pub soldto: Option<String>,
    pub displayed: bool,
    pub finalbid: Option<i64>,
}

/// The player currently under the hammer.
#[derive(Debug, Clone, PartialEq)]
pub struct LivePlayer {
    pub id: i64,
    pub name: String,
    pub team: String,
    pub role: String,
    pub basebid: i64,
}

/// Result of advancing the auction.
#[derive(Debug)]
pub enum AdvanceOutcome {
    /// A new player was drawn and published into the slot.
    Live(LivePlayer),
    /// No eligible players remain; the slot has been cleared.
    Exhausted,
}

/// One row of the owner standings projection.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerStanding {
    pub username: String,
    pub balance: i64,
    pub live_total: f64,
    pub spent: i64,
}

impl OwnerStanding {
    /// Purse left after summing final bids against the opening balance.
    pub fn purse_left(&self) -> i64 {
        self.balance - self.spent
    }
}

/// Load catalog entries from a CSV file with `name,team,role,basebid`
/// columns. Malformed rows are logged and skipped rather than failing the
/// whole file; a file that yields nothing usable is an error.
pub fn load_catalog(path: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    let file = std::fs::File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut entries = Vec::new();
    let mut skipped = 0u32;

    for result in reader.deserialize() {
        let row: RawCatalogRow = match result {
            Ok(row) => row,
            Err(err) => {
                warn!("skipping malformed catalog row: {}", err);
                skipped += 1;
                continue;
            }
        };

        let name = row.name.trim();
        if name.is_empty() {
            warn!("skipping catalog row with empty player name");
            skipped += 1;
            continue;
        }
        if row.basebid <= 0 {
            warn!(
                "skipping catalog row for {}: base bid {} is not positive",
                name, row.basebid
            );
            skipped += 1;
            continue;
        }

        entries.push(CatalogEntry {
            name: name.to_string(),
            team: row.team.trim().to_string(),
            role: row.role.trim().to_string(),
            basebid: row.basebid,
        });
    }

    if skipped > 0 {
        warn!("catalog load skipped {} unusable rows", skipped);
    }
    if entries.is_empty() {
        return Err(CatalogError::Empty);
    }
    Ok(entries)
}
