// SQLite persistence layer: stat lines, the auction catalog, the live slot,
// owners, and the key-value meta store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::auction::{
    AdvanceOutcome, AuctionError, CatalogEntry, CatalogPlayer, LivePlayer, OwnerStanding,
};
use crate::stats::{ManualOverrides, ScoredPlayer};

/// SQLite-backed persistence. All access goes through one connection behind
/// a mutex, so every multi-statement operation below is a single atomic unit
/// with respect to the rest of the process.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                name      TEXT NOT NULL UNIQUE,
                team      TEXT NOT NULL,
                role      TEXT NOT NULL,
                basebid   INTEGER NOT NULL,
                sold      INTEGER,
                soldto    TEXT,
                displayed INTEGER NOT NULL DEFAULT 0,
                finalbid  INTEGER
            );

            CREATE TABLE IF NOT EXISTS cricket_stats (
                player         TEXT PRIMARY KEY,
                team           TEXT NOT NULL DEFAULT '',
                matches        INTEGER NOT NULL DEFAULT 0,
                runs           INTEGER NOT NULL DEFAULT 0,
                hundreds       INTEGER NOT NULL DEFAULT 0,
                fifties        INTEGER NOT NULL DEFAULT 0,
                fours          INTEGER NOT NULL DEFAULT 0,
                sixes          INTEGER NOT NULL DEFAULT 0,
                wickets        INTEGER NOT NULL DEFAULT 0,
                four_wkts      INTEGER NOT NULL DEFAULT 0,
                five_wkts      INTEGER NOT NULL DEFAULT 0,
                catches        INTEGER NOT NULL DEFAULT 0,
                stumpings      INTEGER NOT NULL DEFAULT 0,
                ducks          INTEGER NOT NULL DEFAULT 0,
                keeper_catches INTEGER NOT NULL DEFAULT 0,
                maidens        INTEGER NOT NULL DEFAULT 0,
                three_wkts     INTEGER NOT NULL DEFAULT 0,
                indirect       INTEGER NOT NULL DEFAULT 0,
                direct         INTEGER NOT NULL DEFAULT 0,
                total_points   REAL NOT NULL DEFAULT 0,
                roles_version  TEXT NOT NULL DEFAULT '',
                updated_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS liveplayer (
                slot      INTEGER PRIMARY KEY CHECK (slot = 0),
                player_id INTEGER NOT NULL REFERENCES players(id),
                name      TEXT NOT NULL,
                team      TEXT NOT NULL,
                role      TEXT NOT NULL,
                basebid   INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                username       TEXT PRIMARY KEY,
                balance        INTEGER NOT NULL,
                spent          INTEGER NOT NULL DEFAULT 0,
                maxbid         INTEGER NOT NULL DEFAULT 0,
                averagebidleft REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_players_soldto ON players(soldto);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Stat lines
    // ------------------------------------------------------------------

    /// Read the operator-entered counters for every player that has a row.
    /// One query per harvest run; the pipeline treats the result as
    /// read-only input to scoring.
    pub fn load_manual_overrides(&self) -> Result<HashMap<String, ManualOverrides>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT player, three_wkts, indirect, direct FROM cricket_stats")
            .context("failed to prepare overrides query")?;

        let rows = stmt
            .query_map([], |row| {
                let player: String = row.get(0)?;
                let three_wkts: u32 = row.get(1)?;
                let indirect: u32 = row.get(2)?;
                let direct: u32 = row.get(3)?;
                Ok((
                    player,
                    ManualOverrides {
                        three_wkts,
                        indirect,
                        direct,
                    },
                ))
            })
            .context("failed to query manual overrides")?
            .collect::<std::result::Result<HashMap<_, _>, _>>()
            .context("failed to map override rows")?;

        Ok(rows)
    }

    /// Write the operator counters for one player, creating a stub stat row
    /// if none exists yet. The next harvest run folds them into the score.
    pub fn set_manual_overrides(&self, player: &str, overrides: ManualOverrides) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO cricket_stats (player, three_wkts, indirect, direct)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(player) DO UPDATE SET
                three_wkts = excluded.three_wkts,
                indirect   = excluded.indirect,
                direct     = excluded.direct",
            params![
                player,
                overrides.three_wkts,
                overrides.indirect,
                overrides.direct
            ],
        )
        .with_context(|| format!("failed to set manual counters for {player}"))?;
        Ok(())
    }

    /// Persist a scored batch in one transaction. Each row is upserted by
    /// player identity: scraped counters, the total, and the role sheet
    /// version are overwritten, while the three manual columns are never
    /// named in the update so existing operator entries survive every run.
    /// Either the whole batch commits or none of it does.
    pub fn upsert_stats(&self, batch: &[ScoredPlayer], roles_version: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin stats transaction")?;

        for scored in batch {
            let s = &scored.stats;
            tx.execute(
                "INSERT INTO cricket_stats
                    (player, team, matches, runs, hundreds, fifties, fours, sixes,
                     wickets, four_wkts, five_wkts, catches, stumpings, ducks,
                     keeper_catches, maidens, total_points, roles_version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                 ON CONFLICT(player) DO UPDATE SET
                    team           = excluded.team,
                    matches        = excluded.matches,
                    runs           = excluded.runs,
                    hundreds       = excluded.hundreds,
                    fifties        = excluded.fifties,
                    fours          = excluded.fours,
                    sixes          = excluded.sixes,
                    wickets        = excluded.wickets,
                    four_wkts      = excluded.four_wkts,
                    five_wkts      = excluded.five_wkts,
                    catches        = excluded.catches,
                    stumpings      = excluded.stumpings,
                    ducks          = excluded.ducks,
                    keeper_catches = excluded.keeper_catches,
                    maidens        = excluded.maidens,
                    total_points   = excluded.total_points,
                    roles_version  = excluded.roles_version,
                    updated_at     = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    s.player,
                    s.team,
                    s.matches,
                    s.runs,
                    s.hundreds,
                    s.fifties,
                    s.fours,
                    s.sixes,
                    s.wickets,
                    s.four_wkts,
                    s.five_wkts,
                    s.catches,
                    s.stumpings,
                    s.ducks,
                    s.keeper_catches,
                    s.maidens,
                    scored.total_points,
                    roles_version,
                ],
            )
            .with_context(|| format!("failed to upsert stats for {}", s.player))?;
        }

        tx.commit().context("failed to commit stats batch")?;
        Ok(())
    }

    /// Number of stat rows currently stored.
    pub fn stats_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM cricket_stats", [], |row| row.get(0))
            .context("failed to count stat rows")?;
        Ok(count as usize)
    }

    /// The highest-scoring players, for the status display.
    pub fn top_scorers(&self, limit: usize) -> Result<Vec<(String, f64)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player, total_points FROM cricket_stats
                 ORDER BY total_points DESC, player LIMIT ?1",
            )
            .context("failed to prepare top scorers query")?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })
            .context("failed to query top scorers")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map top scorer rows")?;

        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Meta (key-value JSON store)
    // ------------------------------------------------------------------

    /// Persist an arbitrary JSON value under `key`. Uses INSERT OR REPLACE
    /// so repeated saves overwrite the previous value.
    pub fn save_meta(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str = serde_json::to_string(value).context("failed to serialize meta value")?;
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save meta value")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`. Returns `None` if the
    /// key does not exist.
    pub fn load_meta(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .context("failed to query meta value")?;

        match json_str {
            Some(json_str) => {
                let value: serde_json::Value = serde_json::from_str(&json_str)
                    .context("failed to deserialize meta value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Generate a unique harvest run id from the current UTC timestamp.
    ///
    /// Format: `run_YYYYMMDD_HHMMSS_SSS`. The millisecond suffix keeps ids
    /// unique even if two runs start in the same second.
    pub fn generate_run_id() -> String {
        let now = chrono::Utc::now();
        now.format("run_%Y%m%d_%H%M%S_%3f").to_string()
    }

    // ------------------------------------------------------------------
    // Auction catalog and owners
    // ------------------------------------------------------------------

    /// Import catalog entries in one transaction. Rows are upserted by
    /// name: team, role, and base bid follow the file, while auction state
    /// (sold, soldto, displayed, finalbid) is never touched, so re-importing
    /// mid-auction is safe. Returns the number of entries written.
    pub fn import_catalog(&self, entries: &[CatalogEntry]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin catalog transaction")?;

        for entry in entries {
            tx.execute(
                "INSERT INTO players (name, team, role, basebid)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                    team    = excluded.team,
                    role    = excluded.role,
                    basebid = excluded.basebid",
                params![entry.name, entry.team, entry.role, entry.basebid],
            )
            .with_context(|| format!("failed to import catalog entry {}", entry.name))?;
        }

        tx.commit().context("failed to commit catalog import")?;
        Ok(entries.len())
    }

    /// Number of players in the auction catalog.
    pub fn player_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .context("failed to count players")?;
        Ok(count as usize)
    }

    /// Number of catalog players marked sold.
    pub fn sold_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM players WHERE sold IS NOT NULL AND sold != 0",
                [],
                |row| row.get(0),
            )
            .context("failed to count sold players")?;
        Ok(count as usize)
    }

    /// Seed owner rows for any bidder not yet present. Existing rows are
    /// left alone; balances and the per-owner ledger columns are operator
    /// territory after seeding. Returns the number of rows created.
    pub fn seed_users(&self, bidders: &[String], opening_balance: i64) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin users transaction")?;

        let mut created = 0;
        for bidder in bidders {
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO users (username, balance) VALUES (?1, ?2)",
                    params![bidder, opening_balance],
                )
                .with_context(|| format!("failed to seed user {bidder}"))?;
            created += inserted;
        }

        tx.commit().context("failed to commit user seed")?;
        Ok(created)
    }

    /// Owner standings: live total joined through `soldto` onto stored stat
    /// totals, spend summed from final bids, sorted by live total
    /// descending. Players without a stat row count zero, same as a player
    /// scraped under a spelling the catalog does not use.
    pub fn standings(&self) -> Result<Vec<OwnerStanding>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT u.username,
                        u.balance,
                        COALESCE(SUM(cs.total_points), 0) AS live_total,
                        COALESCE(SUM(p.finalbid), 0) AS spent
                 FROM users u
                 LEFT JOIN players p ON p.soldto = u.username
                 LEFT JOIN cricket_stats cs ON cs.player = p.name
                 GROUP BY u.username, u.balance
                 ORDER BY live_total DESC, u.username",
            )
            .context("failed to prepare standings query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(OwnerStanding {
                    username: row.get(0)?,
                    balance: row.get(1)?,
                    live_total: row.get(2)?,
                    spent: row.get(3)?,
                })
            })
            .context("failed to query standings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map standing rows")?;

        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Live auction operations
    //
    // Every mutating operation below runs as one transaction while holding
    // the connection mutex, so callers observe only complete transitions.
    // ------------------------------------------------------------------

    /// Advance the auction: the current occupant (if any) is marked
    /// displayed and therefore passed over, then a player is drawn uniformly
    /// from the eligible pool (never displayed, never sold) and published
    /// into the slot. An empty pool clears the slot and reports exhaustion;
    /// that is the auction's natural end, not an error.
    pub fn advance_live<R: Rng>(&self, rng: &mut R) -> Result<AdvanceOutcome, AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE players SET displayed = 1
             WHERE id = (SELECT player_id FROM liveplayer WHERE slot = 0)",
            [],
        )?;

        let pool: Vec<i64> = tx
            .prepare("SELECT id FROM players WHERE displayed = 0 AND sold IS NULL")?
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if pool.is_empty() {
            tx.execute("DELETE FROM liveplayer", [])?;
            tx.commit()?;
            return Ok(AdvanceOutcome::Exhausted);
        }

        let chosen = pool[rng.gen_range(0..pool.len())];
        let live = tx.query_row(
            "SELECT id, name, team, role, basebid FROM players WHERE id = ?1",
            params![chosen],
            |row| {
                Ok(LivePlayer {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    team: row.get(2)?,
                    role: row.get(3)?,
                    basebid: row.get(4)?,
                })
            },
        )?;

        tx.execute(
            "INSERT OR REPLACE INTO liveplayer (slot, player_id, name, team, role, basebid)
             VALUES (0, ?1, ?2, ?3, ?4, ?5)",
            params![live.id, live.name, live.team, live.role, live.basebid],
        )?;

        tx.commit()?;
        Ok(AdvanceOutcome::Live(live))
    }

    /// Close the live sale: valid only for the id currently in the slot and
    /// only at or above the base bid. Marks the player sold and clears the
    /// slot in the same transaction, so there is no moment where a sold
    /// player is still live. Returns the sold player's name. A second call
    /// for the same id fails because the slot no longer references it.
    pub fn mark_sold(&self, id: i64, buyer: &str, amount: i64) -> Result<String, AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let live_id: Option<i64> = tx
            .query_row(
                "SELECT player_id FROM liveplayer WHERE slot = 0",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if live_id != Some(id) {
            return Err(AuctionError::NotLive { id });
        }

        let (name, basebid): (String, i64) = tx.query_row(
            "SELECT name, basebid FROM players WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if amount < basebid {
            return Err(AuctionError::BidBelowBase { amount, basebid });
        }

        tx.execute(
            "UPDATE players SET sold = 1, soldto = ?2, displayed = 1, finalbid = ?3
             WHERE id = ?1",
            params![id, buyer, amount],
        )?;
        tx.execute("DELETE FROM liveplayer WHERE player_id = ?1", params![id])?;

        tx.commit()?;
        Ok(name)
    }

    /// Resolve a sale for a player who is not under the hammer, typically
    /// one passed over earlier. Never touches the slot: resolving the
    /// current occupant is rejected so a sold player can never be left
    /// live. Also marks the player displayed, covering entities sold
    /// without ever being drawn. Returns the player's name.
    pub fn resolve_sale(&self, id: i64, buyer: &str, amount: i64) -> Result<String, AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let row: Option<(String, i64, Option<i64>)> = tx
            .query_row(
                "SELECT name, basebid, sold FROM players WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((name, basebid, sold)) = row else {
            return Err(AuctionError::UnknownPlayer { id });
        };
        if sold.unwrap_or(0) != 0 {
            return Err(AuctionError::AlreadySold { id });
        }

        let live_id: Option<i64> = tx
            .query_row(
                "SELECT player_id FROM liveplayer WHERE slot = 0",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if live_id == Some(id) {
            return Err(AuctionError::CurrentlyLive { id });
        }

        if amount < basebid {
            return Err(AuctionError::BidBelowBase { amount, basebid });
        }

        tx.execute(
            "UPDATE players SET sold = 1, soldto = ?2, displayed = 1, finalbid = ?3
             WHERE id = ?1",
            params![id, buyer, amount],
        )?;

        tx.commit()?;
        Ok(name)
    }

    /// Players who have been under the hammer and remain unsold.
    pub fn remaining(&self) -> Result<Vec<CatalogPlayer>, AuctionError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, team, role, basebid, sold, soldto, displayed, finalbid
             FROM players
             WHERE displayed = 1 AND sold IS NULL
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], catalog_player_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// The current live snapshot, if a player is under the hammer.
    pub fn live_snapshot(&self) -> Result<Option<LivePlayer>, AuctionError> {
        let conn = self.conn();
        let live = conn
            .query_row(
                "SELECT player_id, name, team, role, basebid FROM liveplayer WHERE slot = 0",
                [],
                |row| {
                    Ok(LivePlayer {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        team: row.get(2)?,
                        role: row.get(3)?,
                        basebid: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(live)
    }

    /// One catalog row by exact name. The desk accepts names where ids are
    /// not at hand, so lookups use the same strict spelling as everything
    /// else.
    pub fn find_player(&self, name: &str) -> Result<Option<CatalogPlayer>, AuctionError> {
        let conn = self.conn();
        let player = conn
            .query_row(
                "SELECT id, name, team, role, basebid, sold, soldto, displayed, finalbid
                 FROM players WHERE name = ?1",
                params![name],
                catalog_player_from_row,
            )
            .optional()?;
        Ok(player)
    }

    /// One catalog row by id, mostly for inspection after a sale.
    pub fn catalog_player(&self, id: i64) -> Result<Option<CatalogPlayer>, AuctionError> {
        let conn = self.conn();
        let player = conn
            .query_row(
                "SELECT id, name, team, role, basebid, sold, soldto, displayed, finalbid
                 FROM players WHERE id = ?1",
                params![id],
                catalog_player_from_row,
            )
            .optional()?;
        Ok(player)
    }
}

fn catalog_player_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogPlayer> {
    let sold: Option<i64> = row.get(5)?;
    let displayed: i64 = row.get(7)?;
    Ok(CatalogPlayer {
        id: row.get(0)?,
        name: row.get(1)?,
        team: row.get(2)?,
        role: row.get(3)?,
        basebid: row.get(4)?,
        sold: sold.map(|v| v != 0),
        soldto: row.get(6)?,
        displayed: displayed != 0,
        finalbid: row.get(8)?,
    })
}
