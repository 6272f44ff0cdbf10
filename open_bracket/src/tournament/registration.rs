//! Team admission: registration list and the parallel standings list.
//!
//! All functions validate before mutating, so a failed call leaves the
//! tournament untouched.

use super::errors::{TournamentError, TournamentResult};
use super::models::{
    AdmissionStatus, Standing, TeamId, TeamRegistration, Tournament, TournamentStatus,
};
use chrono::{DateTime, Utc};

/// Register a team.
///
/// # Errors
///
/// * `TournamentError::DuplicateRegistration` - Team already in the list
/// * `TournamentError::TournamentFull` - `max_teams` registrations reached
/// * `TournamentError::RegistrationClosed` - Tournament is not `upcoming`
pub fn register(
    tournament: &mut Tournament,
    team_id: TeamId,
    now: DateTime<Utc>,
) -> TournamentResult<()> {
    if tournament.registration(team_id).is_some() {
        return Err(TournamentError::DuplicateRegistration(team_id));
    }

    if tournament.registered_teams.len() >= tournament.max_teams {
        return Err(TournamentError::TournamentFull {
            max_teams: tournament.max_teams,
        });
    }

    let status = tournament.status();
    if status != TournamentStatus::Upcoming {
        return Err(TournamentError::RegistrationClosed { status });
    }

    tournament.registered_teams.push(TeamRegistration {
        team_id,
        registered_at: now,
        admission_status: AdmissionStatus::Registered,
    });
    tournament.standings.push(Standing::new(team_id));

    Ok(())
}

/// Remove a team's registration and standing. Returns whether anything was removed.
///
/// # Errors
///
/// * `TournamentError::TeamInPlay` - Matches or a bracket already exist; use [`withdraw`]
pub fn unregister(tournament: &mut Tournament, team_id: TeamId) -> TournamentResult<bool> {
    if tournament.registration(team_id).is_none() {
        return Ok(false);
    }
    ensure_not_scheduled(tournament, team_id)?;

    tournament.registered_teams.retain(|r| r.team_id != team_id);
    tournament.standings.retain(|s| s.team_id != team_id);
    Ok(true)
}

/// Confirm a registered team.
///
/// # Errors
///
/// * `TournamentError::NotRegistered` - Team is not in the list
pub fn approve(tournament: &mut Tournament, team_id: TeamId) -> TournamentResult<()> {
    let registration = tournament
        .registered_teams
        .iter_mut()
        .find(|r| r.team_id == team_id)
        .ok_or(TournamentError::NotRegistered(team_id))?;

    registration.admission_status = AdmissionStatus::Confirmed;
    Ok(())
}

/// Turn a team away, removing its registration and standing.
///
/// # Errors
///
/// * `TournamentError::NotRegistered` - Team is not in the list
/// * `TournamentError::TeamInPlay` - Matches or a bracket already exist
pub fn reject(tournament: &mut Tournament, team_id: TeamId) -> TournamentResult<()> {
    if !unregister(tournament, team_id)? {
        return Err(TournamentError::NotRegistered(team_id));
    }
    Ok(())
}

// Once matches exist the team's standing backs its results.
fn ensure_not_scheduled(tournament: &Tournament, team_id: TeamId) -> TournamentResult<()> {
    if !tournament.matches.is_empty() || tournament.bracket.is_some() {
        return Err(TournamentError::TeamInPlay(team_id));
    }
    Ok(())
}

/// Mark a team as withdrawn. The entry stays in the list and keeps its slot.
///
/// # Errors
///
/// * `TournamentError::NotRegistered` - Team is not in the list
/// * `TournamentError::InvalidTransition` - Tournament already completed or cancelled
pub fn withdraw(tournament: &mut Tournament, team_id: TeamId) -> TournamentResult<()> {
    let status = tournament.status();
    if matches!(
        status,
        TournamentStatus::Completed | TournamentStatus::Cancelled
    ) {
        return Err(TournamentError::InvalidTransition {
            from: status,
            to: status,
        });
    }

    let registration = tournament
        .registered_teams
        .iter_mut()
        .find(|r| r.team_id == team_id)
        .ok_or(TournamentError::NotRegistered(team_id))?;

    registration.admission_status = AdmissionStatus::Withdrawn;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::models::{StatusControl, TournamentConfig, TournamentFormat};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 18, 30, 0).unwrap()
    }

    fn tournament(max_teams: usize) -> Tournament {
        let config = TournamentConfig::new(
            "League Night",
            TournamentFormat::RoundRobin,
            max_teams,
            now() + Duration::days(1),
            now() + Duration::days(2),
        );
        Tournament::from_config(7, config, now())
    }

    #[test]
    fn test_register_appends_registration_and_standing() {
        let mut t = tournament(4);
        register(&mut t, 100, now()).unwrap();
        register(&mut t, 200, now()).unwrap();

        assert_eq!(t.registered_teams.len(), 2);
        assert_eq!(t.registered_teams[1].team_id, 200);
        assert_eq!(
            t.registered_teams[0].admission_status,
            AdmissionStatus::Registered
        );
        assert_eq!(t.standings, vec![Standing::new(100), Standing::new(200)]);
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut t = tournament(4);
        register(&mut t, 100, now()).unwrap();
        assert!(matches!(
            register(&mut t, 100, now()),
            Err(TournamentError::DuplicateRegistration(100))
        ));
        assert_eq!(t.standings.len(), 1);
    }

    #[test]
    fn test_register_full_fails() {
        let mut t = tournament(2);
        register(&mut t, 1, now()).unwrap();
        register(&mut t, 2, now()).unwrap();
        assert!(matches!(
            register(&mut t, 3, now()),
            Err(TournamentError::TournamentFull { max_teams: 2 })
        ));
    }

    #[test]
    fn test_register_closed_once_started() {
        let mut t = tournament(4);
        t.status = StatusControl::Manual(TournamentStatus::Ongoing);
        assert!(matches!(
            register(&mut t, 1, now()),
            Err(TournamentError::RegistrationClosed {
                status: TournamentStatus::Ongoing
            })
        ));
        assert!(t.registered_teams.is_empty());
        assert!(t.standings.is_empty());
    }

    #[test]
    fn test_unregister_is_safe_when_absent() {
        let mut t = tournament(4);
        register(&mut t, 1, now()).unwrap();
        assert!(!unregister(&mut t, 99).unwrap());
        assert!(unregister(&mut t, 1).unwrap());
        assert!(t.registered_teams.is_empty());
        assert!(t.standings.is_empty());
    }

    #[test]
    fn test_approve_and_reject() {
        let mut t = tournament(4);
        register(&mut t, 1, now()).unwrap();
        register(&mut t, 2, now()).unwrap();

        approve(&mut t, 1).unwrap();
        assert_eq!(
            t.registration(1).unwrap().admission_status,
            AdmissionStatus::Confirmed
        );
        assert!(matches!(
            approve(&mut t, 3),
            Err(TournamentError::NotRegistered(3))
        ));

        reject(&mut t, 2).unwrap();
        assert!(t.registration(2).is_none());
        assert!(t.standing(2).is_none());
        assert!(matches!(
            reject(&mut t, 2),
            Err(TournamentError::NotRegistered(2))
        ));
    }

    #[test]
    fn test_unregister_and_reject_refused_once_scheduled() {
        let mut t = tournament(4);
        register(&mut t, 1, now()).unwrap();
        register(&mut t, 2, now()).unwrap();
        t.matches.push(uuid::Uuid::new_v4());

        assert!(matches!(
            unregister(&mut t, 1),
            Err(TournamentError::TeamInPlay(1))
        ));
        assert!(matches!(
            reject(&mut t, 2),
            Err(TournamentError::TeamInPlay(2))
        ));
        assert!(!unregister(&mut t, 99).unwrap());
        assert_eq!(t.registered_teams.len(), 2);
        assert_eq!(t.standings.len(), 2);

        withdraw(&mut t, 1).unwrap();
    }

    #[test]
    fn test_withdraw_keeps_slot() {
        let mut t = tournament(2);
        register(&mut t, 1, now()).unwrap();
        register(&mut t, 2, now()).unwrap();
        withdraw(&mut t, 2).unwrap();

        assert_eq!(t.admitted_teams(), vec![1]);
        assert!(matches!(
            register(&mut t, 3, now()),
            Err(TournamentError::TournamentFull { .. })
        ));

        t.status = StatusControl::Manual(TournamentStatus::Completed);
        assert!(withdraw(&mut t, 1).is_err());
    }
}
