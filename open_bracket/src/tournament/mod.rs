//! Tournament module for elimination and round-robin competitions.
//!
//! This module provides tournament management functionality including:
//! - Tournament creation, status lifecycle and date-driven status refresh
//! - Team registration and approval
//! - Match schedule and elimination bracket generation
//! - Score recording, winner advancement and standings
//!
//! ## Example
//!
//! ```no_run
//! use open_bracket::db::{Database, PgTeamRoster, PgTournamentRepository};
//! use open_bracket::notify::LogNotifier;
//! use open_bracket::tournament::{TournamentConfig, TournamentFormat, TournamentManager};
//! use chrono::{Duration, Utc};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let manager = TournamentManager::new(
//!         Arc::new(PgTournamentRepository::new(db.pool().clone())),
//!         Arc::new(PgTeamRoster::new(db.pool().clone())),
//!         Arc::new(LogNotifier),
//!     );
//!
//!     let start = Utc::now() + Duration::days(7);
//!     let config = TournamentConfig::new(
//!         "Spring Knockout",
//!         TournamentFormat::SingleElimination,
//!         16,
//!         start,
//!         start + Duration::days(2),
//!     );
//!
//!     let tournament = manager.create_tournament(config).await?;
//!     println!("Created tournament: {}", tournament.id);
//!
//!     Ok(())
//! }
//! ```

pub mod bracket;
pub mod errors;
pub mod lifecycle;
pub mod manager;
pub mod models;
pub mod registration;
pub mod schedule;
pub mod scheduler;
pub mod standings;

pub use bracket::{Advancement, Bracket, BracketMatch, BracketRound, BracketSlot, Side};
pub use errors::{ErrorKind, TournamentError, TournamentResult};
pub use manager::TournamentManager;
pub use models::{
    AdmissionStatus, Match, MatchId, MatchSide, MatchStatus, ScheduleSettings, Standing,
    StatusControl, TeamId, TeamRegistration, Tournament, TournamentConfig, TournamentFormat,
    TournamentId, TournamentStatus,
};
pub use scheduler::{PassReport, SchedulerHandle, SchedulerMessage, StatusScheduler};
