// Auction desk entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, terminal stays clean for the desk)
// 2. Load config
// 3. Open database
// 4. Seed the player catalog and owners when empty
// 5. Dispatch the subcommand

use std::time::Duration;

use auction_desk::auction;
use auction_desk::config;
use auction_desk::db::Database;
use auction_desk::harvest::fetch::HttpSource;
use auction_desk::harvest::runner::{self, HarvestReport, LAST_HARVEST_KEY};
use auction_desk::harvest::score::ScoringEngine;

use anyhow::Context;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print_usage();
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        print_usage();
        return Ok(());
    }

    // 1. Initialize tracing (log to file, terminal stays clean for the desk)
    init_tracing()?;
    info!("Auction desk starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: tournament={}, role sheet={}",
        config.tournament.name, config.roles.version
    );

    // 3. Open database
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 4. Seed the player catalog and owners when empty
    seed_if_empty(&db, &config)?;

    // 5. Dispatch the subcommand
    match command {
        "serve" => serve(&db, &config).await,
        "harvest" => harvest_once(&db, &config).await,
        "status" => status(&db, &config),
        "next" => next(&db),
        "sold" => sold(&db, &args[1..]),
        "resolve" => resolve(&db, &args[1..]),
        "remaining" => remaining(&db),
        "live" => live(&db),
        "standings" => standings(&db),
        other => {
            eprintln!("unknown command: {other}");
            print_usage();
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    eprintln!(
        "Usage: gully <command>\n\
         \n\
         Commands:\n\
         \x20 serve                        run the harvest loop until Ctrl-C\n\
         \x20 harvest                      run one harvest now and exit\n\
         \x20 status                       show catalog, scores, and the last harvest\n\
         \x20 next                         draw the next player into the live slot\n\
         \x20 sold <id|name> <buyer> <amount>     close the sale on the live player\n\
         \x20 resolve <id|name> <buyer> <amount>  record a sale for a passed-over player\n\
         \x20 remaining                    list passed-over, unsold players\n\
         \x20 live                         show the player currently under the hammer\n\
         \x20 standings                    show owner standings"
    );
}

/// Import the catalog file and seed owner rows on first run. An absent
/// catalog file is tolerated so the harvest side can run on its own; a
/// present but unusable file is an error the operator needs to see.
fn seed_if_empty(db: &Database, config: &config::Config) -> anyhow::Result<()> {
    if db.player_count()? == 0 {
        match auction::load_catalog(&config.catalog_path) {
            Ok(entries) => {
                let written = db.import_catalog(&entries)?;
                info!("Seeded {} catalog players from {}", written, config.catalog_path);
            }
            Err(auction::CatalogError::FileRead(err)) => {
                warn!(
                    "No catalog file at {} ({}); auction catalog left empty",
                    config.catalog_path, err
                );
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to load catalog from {}", config.catalog_path)
                });
            }
        }
    }

    let created = db.seed_users(&config.auction.bidders, config.auction.opening_balance)?;
    if created > 0 {
        info!(
            "Seeded {} owners with an opening balance of {}",
            created, config.auction.opening_balance
        );
    }
    Ok(())
}

/// Run the harvest loop until Ctrl-C. The first tick fires immediately, so
/// the desk has fresh scores as soon as it comes up.
async fn serve(db: &Database, config: &config::Config) -> anyhow::Result<()> {
    let source = HttpSource::new(
        config.sources.clone(),
        Duration::from_secs(config.harvest.fetch_timeout_secs),
    )
    .context("failed to build HTTP client")?;
    let engine = ScoringEngine::new(&config.roles);

    println!(
        "auction desk serving: harvesting every {}s (Ctrl-C to stop)",
        config.harvest.interval_secs
    );
    info!("Harvest loop running every {}s", config.harvest.interval_secs);

    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.harvest.interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match runner::run_harvest(db, &source, &engine).await {
                    Ok(report) => println!(
                        "harvest {} {}: {} players scored, {} anomalies",
                        report.run_id, report.status, report.players_scored, report.anomalies
                    ),
                    Err(err) => error!("Harvest run failed: {:#}", err),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    println!("auction desk stopped");
    Ok(())
}

async fn harvest_once(db: &Database, config: &config::Config) -> anyhow::Result<()> {
    let source = HttpSource::new(
        config.sources.clone(),
        Duration::from_secs(config.harvest.fetch_timeout_secs),
    )
    .context("failed to build HTTP client")?;
    let engine = ScoringEngine::new(&config.roles);

    let report = runner::run_harvest(db, &source, &engine).await?;
    println!(
        "harvest {} {}: {} players scored, {} anomalies",
        report.run_id, report.status, report.players_scored, report.anomalies
    );
    for outcome in &report.categories {
        match &outcome.error {
            None => println!("  {}: {} records", outcome.category, outcome.records),
            Some(err) => println!("  {}: FAILED ({err})", outcome.category),
        }
    }
    Ok(())
}

fn status(db: &Database, config: &config::Config) -> anyhow::Result<()> {
    println!("tournament: {}", config.tournament.name);
    println!("role sheet: {}", config.roles.version);
    println!(
        "catalog: {} players, {} sold",
        db.player_count()?,
        db.sold_count()?
    );
    println!("stat rows: {}", db.stats_count()?);

    match db.load_meta(LAST_HARVEST_KEY)? {
        Some(value) => {
            let report: HarvestReport = serde_json::from_value(value)
                .context("stored harvest report is unreadable")?;
            println!(
                "last harvest: {} {} at {} ({} players scored, {} anomalies)",
                report.run_id,
                report.status,
                report.finished_at,
                report.players_scored,
                report.anomalies
            );
        }
        None => println!("last harvest: never run"),
    }

    let top = db.top_scorers(5)?;
    if !top.is_empty() {
        println!("top scorers:");
        for (name, points) in top {
            println!("  {points:>8.1}  {name}");
        }
    }
    Ok(())
}

fn next(db: &Database) -> anyhow::Result<()> {
    match db.advance_live(&mut rand::thread_rng())? {
        auction::AdvanceOutcome::Live(player) => {
            println!(
                "now live: [{}] {} ({}, {}) base bid {}",
                player.id, player.name, player.team, player.role, player.basebid
            );
        }
        auction::AdvanceOutcome::Exhausted => {
            println!("no eligible players remain; the live slot is clear");
        }
    }
    Ok(())
}

fn sold(db: &Database, args: &[String]) -> anyhow::Result<()> {
    let (id, buyer, amount) = parse_sale_args(db, args, "sold")?;
    let name = db.mark_sold(id, &buyer, amount)?;
    println!("sold: [{id}] {name} to {buyer} for {amount}");
    Ok(())
}

fn resolve(db: &Database, args: &[String]) -> anyhow::Result<()> {
    let (id, buyer, amount) = parse_sale_args(db, args, "resolve")?;
    let name = db.resolve_sale(id, &buyer, amount)?;
    println!("resolved: [{id}] {name} to {buyer} for {amount}");
    Ok(())
}

/// The player argument takes an id or an exact catalog name.
fn parse_sale_args(
    db: &Database,
    args: &[String],
    command: &str,
) -> anyhow::Result<(i64, String, i64)> {
    let [target, buyer, amount] = args else {
        anyhow::bail!("usage: gully {command} <id|name> <buyer> <amount>");
    };
    let id = match target.parse::<i64>() {
        Ok(id) => id,
        Err(_) => match db.find_player(target)? {
            Some(player) => player.id,
            None => anyhow::bail!("no catalog player named {target:?}"),
        },
    };
    let amount: i64 = amount
        .parse()
        .with_context(|| format!("amount {amount:?} is not a number"))?;
    Ok((id, buyer.clone(), amount))
}

fn remaining(db: &Database) -> anyhow::Result<()> {
    let players = db.remaining()?;
    if players.is_empty() {
        println!("no passed-over players are waiting");
        return Ok(());
    }
    println!("passed over and still unsold:");
    for p in players {
        println!(
            "  [{:>3}] {:<28} {:<14} {:<14} base {}",
            p.id, p.name, p.team, p.role, p.basebid
        );
    }
    Ok(())
}

fn live(db: &Database) -> anyhow::Result<()> {
    match db.live_snapshot()? {
        Some(player) => println!(
            "live: [{}] {} ({}, {}) base bid {}",
            player.id, player.name, player.team, player.role, player.basebid
        ),
        None => println!("no player is currently live"),
    }
    Ok(())
}

fn standings(db: &Database) -> anyhow::Result<()> {
    let standings = db.standings()?;
    if standings.is_empty() {
        println!("no owners seeded yet");
        return Ok(());
    }
    for (rank, s) in standings.iter().enumerate() {
        println!(
            "{:>2}. {:<16} {:>8.1} pts  spent {:>5}  purse left {:>5}",
            rank + 1,
            s.username,
            s.live_total,
            s.spent,
            s.purse_left()
        );
    }
    Ok(())
}

/// Initialize tracing to log to a file, keeping stdout for command output.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("gully.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auction_desk=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
