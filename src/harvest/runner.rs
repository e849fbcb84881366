// One harvest run end to end: fetch all category pages concurrently, parse
// and merge them, fold in operator counters, score, and persist the batch.

use anyhow::{Context, Result};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::Database;
use crate::harvest::fetch::RecordSource;
use crate::harvest::merge::merge_records;
use crate::harvest::score::ScoringEngine;
use crate::harvest::table::parse_category_table;
use crate::stats::Category;

/// Meta key under which the most recent harvest report is stored.
pub const LAST_HARVEST_KEY: &str = "last_harvest";

/// How a harvest run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvestStatus {
    /// Every category page was fetched and parsed.
    Completed,
    /// At least one category failed; scores cover what was available.
    Partial,
    /// No category could be fetched; nothing was scored or persisted.
    Failed,
}

impl std::fmt::Display for HarvestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HarvestStatus::Completed => "completed",
            HarvestStatus::Partial => "partial",
            HarvestStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Per-category result inside a harvest report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub category: Category,
    pub records: usize,
    pub anomalies: u32,
    pub error: Option<String>,
}

/// Summary of one harvest run, persisted under [`LAST_HARVEST_KEY`] so the
/// status display can show what last happened and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestReport {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub status: HarvestStatus,
    pub categories: Vec<CategoryOutcome>,
    pub players_scored: usize,
    pub anomalies: u32,
    pub roles_version: String,
}

/// Run one harvest. Category failures are isolated: a page that cannot be
/// fetched yields zero records for that category and the run degrades to
/// `Partial`, only an all-category failure aborts scoring. The resulting
/// report is persisted either way. Database errors are the only hard
/// failures.
pub async fn run_harvest<S: RecordSource>(
    db: &Database,
    source: &S,
    engine: &ScoringEngine,
) -> Result<HarvestReport> {
    let run_id = Database::generate_run_id();
    let started_at = chrono::Utc::now().to_rfc3339();
    info!("harvest {} started", run_id);

    let fetches = Category::ALL
        .iter()
        .map(|&category| async move { (category, source.fetch(category).await) });
    let pages = join_all(fetches).await;

    let mut outcomes = Vec::with_capacity(Category::ALL.len());
    let mut all_records = Vec::new();
    let mut anomaly_total = 0u32;
    let mut failures = 0usize;

    for (category, fetched) in pages {
        match fetched {
            Ok(html) => {
                let parsed = parse_category_table(category, &html);
                anomaly_total += parsed.anomalies;
                outcomes.push(CategoryOutcome {
                    category,
                    records: parsed.records.len(),
                    anomalies: parsed.anomalies,
                    error: None,
                });
                all_records.extend(parsed.records);
            }
            Err(err) => {
                warn!("harvest {}: {} fetch failed: {}", run_id, category, err);
                failures += 1;
                outcomes.push(CategoryOutcome {
                    category,
                    records: 0,
                    anomalies: 0,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    if failures == Category::ALL.len() {
        let report = HarvestReport {
            run_id: run_id.clone(),
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            status: HarvestStatus::Failed,
            categories: outcomes,
            players_scored: 0,
            anomalies: 0,
            roles_version: engine.roles_version().to_string(),
        };
        save_report(db, &report)?;
        warn!("harvest {} failed: no category page could be fetched", run_id);
        return Ok(report);
    }

    let merged = merge_records(&all_records);
    let overrides = db
        .load_manual_overrides()
        .context("failed to load manual counters before scoring")?;
    let scored = engine.score_all(merged, &overrides);
    let players_scored = scored.len();

    db.upsert_stats(&scored, engine.roles_version())
        .context("failed to persist scored batch")?;

    let status = if failures == 0 {
        HarvestStatus::Completed
    } else {
        HarvestStatus::Partial
    };
    let report = HarvestReport {
        run_id: run_id.clone(),
        started_at,
        finished_at: chrono::Utc::now().to_rfc3339(),
        status,
        categories: outcomes,
        players_scored,
        anomalies: anomaly_total,
        roles_version: engine.roles_version().to_string(),
    };
    save_report(db, &report)?;

    info!(
        "harvest {} {}: {} players scored, {} anomalies",
        run_id, report.status, players_scored, anomaly_total
    );
    Ok(report)
}

fn save_report(db: &Database, report: &HarvestReport) -> Result<()> {
    let value = serde_json::to_value(report).context("failed to serialize harvest report")?;
    db.save_meta(LAST_HARVEST_KEY, &value)
        .context("failed to persist harvest report")
}
