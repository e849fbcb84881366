// Integration tests for the auction desk.
//
// These tests exercise the full system end-to-end using the library crate's
// public API. They verify that the major subsystems (harvest pipeline over
// canned record pages, scoring with role scaling, operator counter
// preservation, catalog import, and the live auction state machine) work
// together correctly.

use std::sync::Arc;

use auction_desk::auction::{load_catalog, AdvanceOutcome, AuctionError};
use auction_desk::config::RoleSheet;
use auction_desk::db::Database;
use auction_desk::harvest::fetch::{FetchError, RecordSource};
use auction_desk::harvest::runner::{run_harvest, HarvestStatus};
use auction_desk::harvest::score::ScoringEngine;
use auction_desk::stats::{Category, ManualOverrides};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ===========================================================================
// Test helpers
// ===========================================================================

/// Fixture directory path (relative to project root, which is the cwd for
/// `cargo test`).
const FIXTURES: &str = "tests/fixtures";

/// A record source that serves the canned tournament pages, optionally
/// failing chosen categories.
struct FixtureSource {
    fail: Vec<Category>,
}

impl FixtureSource {
    fn good() -> Self {
        FixtureSource { fail: Vec::new() }
    }
}

#[async_trait]
impl RecordSource for FixtureSource {
    async fn fetch(&self, category: Category) -> Result<String, FetchError> {
        if self.fail.contains(&category) {
            return Err(FetchError::Status {
                category,
                status: reqwest::StatusCode::BAD_GATEWAY,
            });
        }
        let file = match category {
            Category::Runs => "batting.html",
            Category::Wickets => "bowling.html",
            Category::Dismissals => "dismissals.html",
            Category::Catches => "catches.html",
        };
        let path = format!("{FIXTURES}/{file}");
        Ok(std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("fixture {path} should be readable: {e}")))
    }
}

/// The role sheet the fixture pages were scored against.
fn role_sheet() -> RoleSheet {
    RoleSheet {
        version: "ct25-v1".to_string(),
        captains: vec![
            "Shubman Gill (IND)".to_string(),
            "V Kohli (IND)".to_string(),
            "H Klaasen (SA)".to_string(),
            "KS Williamson (NZ)".to_string(),
            "KA Maharaj (SA)".to_string(),
        ],
        vice_captains: vec![
            "JC Buttler (ENG)".to_string(),
            "RG Sharma (IND)".to_string(),
            "TM Head (AUS)".to_string(),
            "SPD Smith (AUS)".to_string(),
            "BM Duckett (ENG)".to_string(),
        ],
    }
}

fn engine() -> ScoringEngine {
    ScoringEngine::new(&role_sheet())
}

fn fresh_db() -> Database {
    Database::open(":memory:").expect("in-memory database should open")
}

fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Look up a player's stored total.
fn points_for(db: &Database, name: &str) -> f64 {
    db.top_scorers(100)
        .expect("top scorers should load")
        .into_iter()
        .find(|(n, _)| n == name)
        .unwrap_or_else(|| panic!("{name} should have a stat row"))
        .1
}

fn advance_expect_live(db: &Database, rng: &mut StdRng) -> auction_desk::auction::LivePlayer {
    match db.advance_live(rng).expect("advance should succeed") {
        AdvanceOutcome::Live(player) => player,
        AdvanceOutcome::Exhausted => panic!("the pool should not be exhausted yet"),
    }
}

// ===========================================================================
// Harvest pipeline
// ===========================================================================

#[tokio::test]
async fn harvest_scores_the_full_fixture_tournament() {
    let db = fresh_db();
    let report = run_harvest(&db, &FixtureSource::good(), &engine())
        .await
        .expect("harvest should succeed");

    assert_eq!(report.status, HarvestStatus::Completed);
    assert_eq!(report.players_scored, 19);
    assert_eq!(report.anomalies, 1);
    assert_eq!(report.roles_version, "ct25-v1");
    assert!(report.categories.iter().all(|c| c.error.is_none()));

    let runs = report
        .categories
        .iter()
        .find(|c| c.category == Category::Runs)
        .unwrap();
    assert_eq!(runs.records, 7);
    assert_eq!(runs.anomalies, 0);

    // The row with an empty player cell is dropped and tallied.
    let catches = report
        .categories
        .iter()
        .find(|c| c.category == Category::Catches)
        .unwrap();
    assert_eq!(catches.records, 5);
    assert_eq!(catches.anomalies, 1);

    assert_eq!(db.stats_count().unwrap(), 19);
}

#[tokio::test]
async fn harvest_totals_combine_categories_and_roles() {
    let db = fresh_db();
    run_harvest(&db, &FixtureSource::good(), &engine())
        .await
        .expect("harvest should succeed");

    // Captain: batting 264 plus 4 catches, doubled.
    assert!((points_for(&db, "KS Williamson (NZ)") - 592.0).abs() < f64::EPSILON);
    // Captain: batting 226 plus 5 catches, doubled.
    assert!((points_for(&db, "Shubman Gill (IND)") - 532.0).abs() < f64::EPSILON);
    // Captain with a batting line only.
    assert!((points_for(&db, "V Kohli (IND)") - 506.0).abs() < f64::EPSILON);
    // Vice-captain: batting 274 at 1.5x.
    assert!((points_for(&db, "BM Duckett (ENG)") - 411.0).abs() < f64::EPSILON);
    // No role: batting 324 plus 3 catches.
    assert!((points_for(&db, "RR Ravindra (NZ)") - 348.0).abs() < f64::EPSILON);
    // Bowler: 10 wickets, 1 maiden, 1 five-for.
    assert!((points_for(&db, "MJ Henry (NZ)") - 267.0).abs() < f64::EPSILON);
    // Vice-captain keeper: 5 catches behind the stumps at 1.5x.
    assert!((points_for(&db, "JC Buttler (ENG)") - 60.0).abs() < f64::EPSILON);

    let top = db.top_scorers(1).unwrap();
    assert_eq!(top[0].0, "KS Williamson (NZ)");
}

#[tokio::test]
async fn failed_category_leaves_other_scores_standing() {
    let db = fresh_db();
    let report = run_harvest(
        &db,
        &FixtureSource {
            fail: vec![Category::Wickets],
        },
        &engine(),
    )
    .await
    .expect("harvest should succeed");

    assert_eq!(report.status, HarvestStatus::Partial);
    // The five fixture bowlers appear nowhere else.
    assert_eq!(report.players_scored, 14);
    assert_eq!(db.stats_count().unwrap(), 14);

    assert!((points_for(&db, "KS Williamson (NZ)") - 592.0).abs() < f64::EPSILON);
    assert!(db
        .top_scorers(100)
        .unwrap()
        .iter()
        .all(|(name, _)| name != "MJ Henry (NZ)"));
}

#[tokio::test]
async fn operator_counters_survive_repeated_harvests() {
    let db = fresh_db();
    db.set_manual_overrides(
        "GD Phillips (NZ)",
        ManualOverrides {
            three_wkts: 0,
            indirect: 1,
            direct: 2,
        },
    )
    .unwrap();

    // 6 catches (48) + 1 indirect hit (6) + 2 direct hits (24) = 78.
    run_harvest(&db, &FixtureSource::good(), &engine())
        .await
        .expect("first harvest should succeed");
    assert!((points_for(&db, "GD Phillips (NZ)") - 78.0).abs() < f64::EPSILON);

    run_harvest(&db, &FixtureSource::good(), &engine())
        .await
        .expect("second harvest should succeed");
    assert!((points_for(&db, "GD Phillips (NZ)") - 78.0).abs() < f64::EPSILON);

    let overrides = db.load_manual_overrides().unwrap();
    let manual = overrides.get("GD Phillips (NZ)").unwrap();
    assert_eq!(manual.indirect, 1);
    assert_eq!(manual.direct, 2);
}

// ===========================================================================
// Auction flow
// ===========================================================================

#[test]
fn auction_walkthrough_from_catalog_file() {
    let db = fresh_db();
    let entries = load_catalog(&format!("{FIXTURES}/catalog.csv")).unwrap();
    assert_eq!(db.import_catalog(&entries).unwrap(), 8);

    let mut rng = rng(11);

    // Nothing is live or passed over before the first draw.
    assert!(db.live_snapshot().unwrap().is_none());
    assert!(db.remaining().unwrap().is_empty());

    // First draw sells on the spot.
    let p1 = advance_expect_live(&db, &mut rng);
    assert_eq!(db.live_snapshot().unwrap().unwrap().id, p1.id);
    let name = db.mark_sold(p1.id, "Meera", p1.basebid + 40).unwrap();
    assert_eq!(name, p1.name);
    assert!(db.live_snapshot().unwrap().is_none());
    assert!(db.remaining().unwrap().is_empty());

    // Second draw gets passed over when the third is drawn.
    let p2 = advance_expect_live(&db, &mut rng);
    let p3 = advance_expect_live(&db, &mut rng);
    let passed = db.remaining().unwrap();
    assert_eq!(passed.len(), 1);
    assert_eq!(passed[0].id, p2.id);

    // The live player cannot go through the passed-over path, and a
    // passed-over player cannot go through the live path.
    assert!(matches!(
        db.resolve_sale(p3.id, "Dev", p3.basebid + 10),
        Err(AuctionError::CurrentlyLive { .. })
    ));
    assert!(matches!(
        db.mark_sold(p2.id, "Dev", p2.basebid + 10),
        Err(AuctionError::NotLive { .. })
    ));

    // Resolving the passed-over player clears the list.
    db.resolve_sale(p2.id, "Rohan", p2.basebid).unwrap();
    assert!(db.remaining().unwrap().is_empty());

    // A short bid leaves the live player on the block.
    assert!(matches!(
        db.mark_sold(p3.id, "Dev", p3.basebid - 1),
        Err(AuctionError::BidBelowBase { .. })
    ));
    assert_eq!(db.live_snapshot().unwrap().unwrap().id, p3.id);
    db.mark_sold(p3.id, "Dev", p3.basebid + 10).unwrap();

    // Walk the rest of the catalog without buying.
    let mut further = 0;
    loop {
        match db.advance_live(&mut rng).unwrap() {
            AdvanceOutcome::Live(_) => further += 1,
            AdvanceOutcome::Exhausted => break,
        }
    }
    assert_eq!(further, 5);
    assert!(db.live_snapshot().unwrap().is_none());

    assert_eq!(db.sold_count().unwrap(), 3);
    let leftover = db.remaining().unwrap();
    assert_eq!(leftover.len(), 5);
    assert!(leftover.iter().all(|p| p.displayed && p.sold.is_none()));
}

#[tokio::test]
async fn standings_rank_owners_by_harvested_points() {
    let db = fresh_db();
    run_harvest(&db, &FixtureSource::good(), &engine())
        .await
        .expect("harvest should succeed");

    let entries = load_catalog(&format!("{FIXTURES}/catalog.csv")).unwrap();
    db.import_catalog(&entries).unwrap();
    db.seed_users(
        &["Arjun".to_string(), "Dev".to_string(), "Kiran".to_string()],
        1000,
    )
    .unwrap();

    let kohli = db.find_player("V Kohli (IND)").unwrap().unwrap();
    let ravindra = db.find_player("RR Ravindra (NZ)").unwrap().unwrap();
    let henry = db.find_player("MJ Henry (NZ)").unwrap().unwrap();

    db.resolve_sale(kohli.id, "Arjun", 300).unwrap();
    db.resolve_sale(ravindra.id, "Dev", 250).unwrap();
    db.resolve_sale(henry.id, "Dev", 200).unwrap();

    let standings = db.standings().unwrap();
    assert_eq!(standings.len(), 3);

    // Dev: 348 + 267 = 615 beats Arjun's doubled Kohli at 506.
    assert_eq!(standings[0].username, "Dev");
    assert!((standings[0].live_total - 615.0).abs() < f64::EPSILON);
    assert_eq!(standings[0].spent, 450);
    assert_eq!(standings[0].purse_left(), 550);

    assert_eq!(standings[1].username, "Arjun");
    assert!((standings[1].live_total - 506.0).abs() < f64::EPSILON);
    assert_eq!(standings[1].spent, 300);

    assert_eq!(standings[2].username, "Kiran");
    assert_eq!(standings[2].live_total, 0.0);
    assert_eq!(standings[2].spent, 0);
    assert_eq!(standings[2].purse_left(), 1000);
}

#[test]
fn concurrent_advances_publish_each_player_once() {
    let db = Arc::new(fresh_db());

    let entries: Vec<auction_desk::auction::CatalogEntry> = (0..32)
        .map(|i| auction_desk::auction::CatalogEntry {
            name: format!("Player {i:02}"),
            team: format!("Team {}", i % 8),
            role: "Batter".to_string(),
            basebid: 100,
        })
        .collect();
    db.import_catalog(&entries).unwrap();

    let mut handles = Vec::new();
    for seed in 0..4u64 {
        let db = Arc::clone(&db);
        handles.push(std::thread::spawn(move || {
            let mut rng = rng(seed);
            let mut drawn = Vec::new();
            loop {
                match db.advance_live(&mut rng) {
                    Ok(AdvanceOutcome::Live(player)) => drawn.push(player.id),
                    Ok(AdvanceOutcome::Exhausted) => break,
                    Err(err) => panic!("advance failed: {err}"),
                }
            }
            drawn
        }));
    }

    let mut all: Vec<i64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().expect("thread should not panic"))
        .collect();
    let total = all.len();
    all.sort_unstable();
    all.dedup();

    assert_eq!(all.len(), total, "a player was published more than once");
    assert_eq!(total, 32, "every player should be drawn exactly once");
    assert!(db.live_snapshot().unwrap().is_none());
}
