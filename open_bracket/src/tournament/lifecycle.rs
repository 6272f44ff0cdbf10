//! Tournament status state machine.
//!
//! `upcoming -> ongoing -> completed`, with `cancelled` reachable from
//! `upcoming` or `ongoing`. Explicit transitions switch the tournament to
//! [`StatusControl::Manual`]; until then the status follows the dates.

use super::errors::{TournamentError, TournamentResult};
use super::models::{StatusControl, Tournament, TournamentStatus};
use super::standings;
use chrono::{DateTime, Utc};

/// Minimum number of admitted teams needed to start
pub const MIN_TEAMS_TO_START: usize = 2;

/// Status implied by the tournament dates
pub fn compute_status_from_dates(
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> TournamentStatus {
    if now < start {
        TournamentStatus::Upcoming
    } else if now <= end {
        TournamentStatus::Ongoing
    } else {
        TournamentStatus::Completed
    }
}

/// Recompute an `Auto` status from the dates.
///
/// Manual statuses and cancelled tournaments are left alone. Returns whether
/// the status changed.
pub fn refresh_status(tournament: &mut Tournament, now: DateTime<Utc>) -> bool {
    let StatusControl::Auto(current) = tournament.status else {
        return false;
    };

    if current == TournamentStatus::Cancelled {
        return false;
    }

    let computed = compute_status_from_dates(now, tournament.start_date, tournament.end_date);
    if computed == current {
        return false;
    }

    log::debug!(
        "Tournament {} status {} -> {} from dates",
        tournament.id,
        current,
        computed
    );
    tournament.status = StatusControl::Auto(computed);
    true
}

/// Move an `upcoming` tournament with enough admitted teams to `ongoing`.
///
/// Schedule and bracket creation are left to the caller.
///
/// # Errors
///
/// * `TournamentError::InvalidState` - Tournament is not `upcoming`
/// * `TournamentError::InsufficientTeams` - Fewer than two admitted teams
pub fn start(tournament: &mut Tournament) -> TournamentResult<()> {
    expect_status(tournament, TournamentStatus::Upcoming)?;

    let admitted = tournament.admitted_teams().len();
    if admitted < MIN_TEAMS_TO_START {
        return Err(TournamentError::InsufficientTeams {
            needed: MIN_TEAMS_TO_START,
            current: admitted,
        });
    }

    tournament.status = StatusControl::Manual(TournamentStatus::Ongoing);
    Ok(())
}

/// Finish an `ongoing` tournament and finalize the standings ranks.
///
/// # Errors
///
/// * `TournamentError::InvalidState` - Tournament is not `ongoing`
pub fn end(tournament: &mut Tournament) -> TournamentResult<()> {
    expect_status(tournament, TournamentStatus::Ongoing)?;

    tournament.status = StatusControl::Manual(TournamentStatus::Completed);
    standings::recompute(tournament);
    Ok(())
}

/// Cancel a tournament that has not completed.
///
/// # Errors
///
/// * `TournamentError::InvalidTransition` - Tournament already completed
pub fn cancel(tournament: &mut Tournament) -> TournamentResult<()> {
    let current = tournament.status();
    if current == TournamentStatus::Completed {
        return Err(TournamentError::InvalidTransition {
            from: current,
            to: TournamentStatus::Cancelled,
        });
    }

    tournament.status = StatusControl::Manual(TournamentStatus::Cancelled);
    Ok(())
}

/// Hand status control back to the dates and recompute immediately.
///
/// A cancelled tournament stays cancelled.
pub fn reset_override(tournament: &mut Tournament, now: DateTime<Utc>) {
    tournament.status = StatusControl::Auto(tournament.status());
    refresh_status(tournament, now);
}

fn expect_status(tournament: &Tournament, expected: TournamentStatus) -> TournamentResult<()> {
    let actual = tournament.status();
    if actual != expected {
        return Err(TournamentError::InvalidState { expected, actual });
    }
    Ok(())
}
