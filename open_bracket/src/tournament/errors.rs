//! Tournament error types.

use super::models::{MatchId, MatchStatus, TeamId, TournamentFormat, TournamentId, TournamentStatus};
use crate::db::timeouts::TimeoutError;
use std::time::Duration;
use thiserror::Error;

/// Broad class of a [`TournamentError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is not acceptable
    Validation,
    /// A tournament, team or match does not exist
    NotFound,
    /// The request clashes with the current state
    StateConflict,
    /// Storage or serialization failure
    Internal,
}

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Team {0} is already registered")]
    DuplicateRegistration(TeamId),

    #[error("Tournament is full ({max_teams} teams)")]
    TournamentFull { max_teams: usize },

    #[error("Registration is closed: tournament is {status}")]
    RegistrationClosed { status: TournamentStatus },

    #[error("Insufficient teams: need {needed}, have {current}")]
    InsufficientTeams { needed: usize, current: usize },

    #[error("Scores are level at {0}; a final result needs a winner")]
    EqualScores(u32),

    #[error("Invalid tournament configuration: {0}")]
    InvalidConfig(String),

    #[error("Team {team_id} is not playing in this match")]
    WinnerNotInMatch { team_id: TeamId },

    #[error("{0} tournaments have no elimination bracket")]
    BracketNotSupported(TournamentFormat),

    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("Team {0} is not registered for this tournament")]
    NotRegistered(TeamId),

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("Match {0} is not part of the bracket")]
    NotInBracket(MatchId),

    #[error("Schedule already generated")]
    ScheduleExists,

    #[error("Bracket already generated")]
    BracketExists,

    #[error("Tournament not in correct state: expected {expected}, got {actual}")]
    InvalidState {
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    #[error("Cannot move tournament from {from} to {to}")]
    InvalidTransition {
        from: TournamentStatus,
        to: TournamentStatus,
    },

    #[error("Team {0} is already scheduled; withdraw it instead")]
    TeamInPlay(TeamId),

    #[error("Match {0} already has a different result")]
    ResultAlreadyRecorded(MatchId),

    #[error("Match {0} is {1} and cannot take a score")]
    MatchClosed(MatchId, MatchStatus),

    #[error("Bracket round {round} position {position} already holds team {occupant}")]
    SlotConflict {
        round: u32,
        position: usize,
        occupant: TeamId,
    },

    #[error("Tournament {0} was modified concurrently")]
    ConcurrentModification(TournamentId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl TournamentError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateRegistration(_)
            | Self::TournamentFull { .. }
            | Self::RegistrationClosed { .. }
            | Self::InsufficientTeams { .. }
            | Self::EqualScores(_)
            | Self::InvalidConfig(_)
            | Self::WinnerNotInMatch { .. }
            | Self::BracketNotSupported(_) => ErrorKind::Validation,

            Self::TournamentNotFound(_)
            | Self::TeamNotFound(_)
            | Self::NotRegistered(_)
            | Self::MatchNotFound(_)
            | Self::NotInBracket(_) => ErrorKind::NotFound,

            Self::ScheduleExists
            | Self::BracketExists
            | Self::InvalidState { .. }
            | Self::InvalidTransition { .. }
            | Self::TeamInPlay(_)
            | Self::ResultAlreadyRecorded(_)
            | Self::MatchClosed(..)
            | Self::SlotConflict { .. }
            | Self::ConcurrentModification(_) => ErrorKind::StateConflict,

            Self::Database(_)
            | Self::Serialization(_)
            | Self::Timeout(_)
            | Self::CorruptRecord(_) => ErrorKind::Internal,
        }
    }

    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<TimeoutError> for TournamentError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(duration) => Self::Timeout(duration),
            TimeoutError::Database(e) => Self::Database(e),
        }
    }
}

/// Result type for tournament operations
pub type TournamentResult<T> = Result<T, TournamentError>;
