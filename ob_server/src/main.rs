//! Tournament status daemon.
//!
//! Connects to PostgreSQL, applies migrations and keeps every tournament's
//! stored status in line with its dates until interrupted.

mod config;
mod logging;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Error;
use log::info;
use open_bracket::{
    LogNotifier, TournamentManager,
    db::{Database, PgTeamRoster, PgTournamentRepository},
    tournament::StatusScheduler,
};
use pico_args::Arguments;

use crate::config::ServerConfig;

const HELP: &str = "\
Run the tournament status daemon

USAGE:
  ob_server [OPTIONS]

OPTIONS:
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --interval   SECS        Status recompute period     [default: env STATUS_RECOMPUTE_INTERVAL_SECS or 60]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  MATCH_DURATION_MINS      Default match length for generated schedules [default: 60]
  MATCH_BREAK_MINS         Default break between matches [default: 15]
  DB_MAX_CONNECTIONS       Pool size [default: 20]
  RUST_LOG                 Log filter [default: info,sqlx=warn]
";

struct Args {
    database_url: Option<String>,
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        database_url: pargs.opt_value_from_str("--db-url")?,
        interval_secs: pargs.opt_value_from_str("--interval")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.database_url, args.interval_secs)?;
    config.validate()?;

    info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    let started = Instant::now();
    db.migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to apply migrations: {}", e))?;
    logging::log_performance(
        "database_migrate",
        started.elapsed().as_millis() as u64,
        Some("startup"),
    );
    info!("Database connected successfully");

    let manager = TournamentManager::new(
        Arc::new(PgTournamentRepository::new(db.pool().clone())),
        Arc::new(PgTeamRoster::new(db.pool().clone())),
        Arc::new(LogNotifier),
    )
    .with_default_schedule(config.default_schedule);

    let scheduler = StatusScheduler::new(manager, config.recompute_interval)
        .with_observer(logging::log_scheduler_pass)
        .spawn();

    info!(
        "Status daemon running, recomputing every {:?}. Press Ctrl+C to stop.",
        config.recompute_interval
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to listen for Ctrl+C: {}", e))?;

    info!("Shutting down status daemon...");
    scheduler.shutdown().await;
    db.close().await;

    Ok(())
}
