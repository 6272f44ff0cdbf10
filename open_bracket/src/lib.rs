//! # Open Bracket
//!
//! Tournament organisation: registration, match schedules, elimination
//! brackets and standings, with PostgreSQL persistence.
//!
//! A tournament moves `upcoming -> ongoing -> completed` (or `cancelled`).
//! Until an organiser changes the status explicitly it follows the start and
//! end dates; a [`tournament::StatusScheduler`] keeps stored statuses fresh.
//!
//! ## Core Modules
//!
//! - [`tournament`]: Domain model, pure transitions and the [`TournamentManager`]
//! - [`db`]: Connection pool and repositories (PostgreSQL and in-memory)
//! - [`notify`]: Outbound events for bracket, lifecycle and admission changes
//!
//! ## Example
//!
//! ```
//! use open_bracket::tournament::{Bracket, TournamentFormat};
//!
//! let bracket = Bracket::generate(TournamentFormat::SingleElimination, &[1, 2, 3, 4, 5], &[])
//!     .unwrap();
//! assert_eq!(bracket.total_rounds, 3);
//! assert_eq!(bracket.byes(), &[1, 2, 3]);
//! ```

/// Database pool and repositories.
pub mod db;

/// Notification sinks.
pub mod notify;

/// Tournament domain and manager.
pub mod tournament;

pub use notify::{ChannelNotifier, LogNotifier, TournamentEvent, TournamentNotifier};
pub use tournament::{
    TournamentConfig, TournamentError, TournamentFormat, TournamentManager, TournamentResult,
    TournamentStatus,
};
