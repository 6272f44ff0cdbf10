//! Integration tests for tournament functionality
//!
//! These tests drive the manager over the in-memory repositories, from
//! registration through schedule, scores, standings and completion.

use chrono::{Duration, Utc};
use open_bracket::db::{InMemoryTeamRoster, InMemoryTournamentRepository};
use open_bracket::notify::{ChannelNotifier, LogNotifier, TournamentEvent};
use open_bracket::tournament::{
    AdmissionStatus, Match, MatchStatus, TeamId, TournamentConfig, TournamentError,
    TournamentFormat, TournamentId, TournamentManager, TournamentStatus,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

fn manager() -> TournamentManager {
    TournamentManager::new(
        Arc::new(InMemoryTournamentRepository::new()),
        Arc::new(InMemoryTeamRoster::with_teams(1..=16)),
        Arc::new(LogNotifier),
    )
}

fn manager_with_events() -> (TournamentManager, UnboundedReceiver<TournamentEvent>) {
    let (notifier, events) = ChannelNotifier::new();
    let manager = TournamentManager::new(
        Arc::new(InMemoryTournamentRepository::new()),
        Arc::new(InMemoryTeamRoster::with_teams(1..=16)),
        Arc::new(notifier),
    );
    (manager, events)
}

fn config(format: TournamentFormat, max_teams: usize) -> TournamentConfig {
    let start = Utc::now() + Duration::days(7);
    TournamentConfig::new("League Night", format, max_teams, start, start + Duration::days(3))
}

async fn create_with_teams(
    manager: &TournamentManager,
    format: TournamentFormat,
    max_teams: usize,
    teams: &[TeamId],
) -> TournamentId {
    let t = manager
        .create_tournament(config(format, max_teams))
        .await
        .unwrap();
    for &team_id in teams {
        manager.register_team(t.id, team_id).await.unwrap();
        manager.approve_team(t.id, team_id).await.unwrap();
    }
    t.id
}

/// Scores that make `winner` win `m`, whichever side it plays on
fn win_for(m: &Match, winner: TeamId) -> (u32, u32) {
    if m.team1.team_id == winner { (2, 0) } else { (0, 2) }
}

fn drain(events: &mut UnboundedReceiver<TournamentEvent>) -> Vec<TournamentEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

#[tokio::test]
async fn test_round_robin_full_flow() {
    let (manager, mut events) = manager_with_events();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 4, &[1, 2, 3, 4]).await;

    let started = manager.start_tournament(id).await.unwrap();
    assert_eq!(started.status(), TournamentStatus::Ongoing);
    assert!(started.manual_override());
    assert!(started.bracket.is_none());

    let matches = manager.get_matches(id).await.unwrap();
    assert_eq!(matches.len(), 6);
    for (i, m) in matches.iter().enumerate() {
        assert_eq!(m.match_number, i as u32 + 1);
        assert_eq!(m.status, MatchStatus::Pending);
    }

    // Lower team ID wins every match: 1 beats all, 2 beats 3 and 4, 3 beats 4.
    for m in &matches {
        let winner = m.team1.team_id.min(m.team2.team_id);
        let (s1, s2) = win_for(m, winner);
        let recorded = manager.record_match_score(m.id, s1, s2).await.unwrap();
        assert_eq!(recorded.winner, Some(winner));
        assert_eq!(recorded.status, MatchStatus::Completed);
    }

    let standings = manager.get_standings(id).await.unwrap();
    let order: Vec<_> = standings.iter().map(|s| s.team_id).collect();
    assert_eq!(order, vec![1, 2, 3, 4]);
    assert_eq!(standings[0].points, 9);
    assert_eq!(standings[0].wins, 3);
    assert_eq!(standings[0].losses, 0);
    assert_eq!(standings[3].points, 0);
    assert_eq!(standings[3].losses, 3);
    for (i, s) in standings.iter().enumerate() {
        assert_eq!(s.rank, i as u32 + 1);
    }

    let ended = manager.end_tournament(id).await.unwrap();
    assert_eq!(ended.status(), TournamentStatus::Completed);

    let received = drain(&mut events);
    let approvals = received
        .iter()
        .filter(|e| matches!(e, TournamentEvent::TeamApproved { .. }))
        .count();
    assert_eq!(approvals, 4);
    assert!(received.contains(&TournamentEvent::TournamentStarted { tournament_id: id }));
    assert!(!received
        .iter()
        .any(|e| matches!(e, TournamentEvent::BracketGenerated { .. })));
    assert_eq!(
        received.last(),
        Some(&TournamentEvent::TournamentCompleted {
            tournament_id: id,
            leader: Some(1),
        })
    );
}

#[tokio::test]
async fn test_registration_limits() {
    let manager = manager();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 2, &[1]).await;

    let err = manager.register_team(id, 1).await.unwrap_err();
    assert!(matches!(err, TournamentError::DuplicateRegistration(1)));

    manager.register_team(id, 2).await.unwrap();
    let err = manager.register_team(id, 3).await.unwrap_err();
    assert!(matches!(err, TournamentError::TournamentFull { max_teams: 2 }));

    let t = manager.get_tournament(id).await.unwrap();
    assert_eq!(t.registered_teams.len(), 2);
    assert_eq!(t.standings.len(), 2);
}

#[tokio::test]
async fn test_registration_closes_once_started() {
    let manager = manager();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 8, &[1, 2]).await;
    manager.start_tournament(id).await.unwrap();

    let err = manager.register_team(id, 3).await.unwrap_err();
    assert!(matches!(
        err,
        TournamentError::RegistrationClosed {
            status: TournamentStatus::Ongoing
        }
    ));
}

#[tokio::test]
async fn test_reject_and_unregister() {
    let (manager, mut events) = manager_with_events();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 8, &[]).await;
    manager.register_team(id, 1).await.unwrap();
    manager.register_team(id, 2).await.unwrap();

    manager.reject_team(id, 1).await.unwrap();
    assert!(matches!(
        manager.reject_team(id, 1).await,
        Err(TournamentError::NotRegistered(1))
    ));

    assert!(manager.unregister_team(id, 2).await.unwrap());
    assert!(!manager.unregister_team(id, 2).await.unwrap());

    let t = manager.get_tournament(id).await.unwrap();
    assert!(t.registered_teams.is_empty());
    assert!(t.standings.is_empty());

    assert_eq!(
        drain(&mut events),
        vec![TournamentEvent::TeamRejected {
            tournament_id: id,
            team_id: 1,
        }]
    );
}

#[tokio::test]
async fn test_withdrawn_team_is_not_scheduled() {
    let manager = manager();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 8, &[1, 2, 3, 4]).await;
    manager.withdraw_team(id, 4).await.unwrap();

    let matches = manager.generate_schedule(id).await.unwrap();
    assert_eq!(matches.len(), 3);
    assert!(matches.iter().all(|m| !m.pairs(4, 1) && !m.pairs(4, 2) && !m.pairs(4, 3)));

    let t = manager.get_tournament(id).await.unwrap();
    assert_eq!(
        t.registration(4).map(|r| r.admission_status),
        Some(AdmissionStatus::Withdrawn)
    );
    assert!(matches!(
        manager.generate_schedule(id).await,
        Err(TournamentError::ScheduleExists)
    ));
}

#[tokio::test]
async fn test_start_requires_two_teams() {
    let manager = manager();
    let id = create_with_teams(&manager, TournamentFormat::SingleElimination, 8, &[1]).await;

    let err = manager.start_tournament(id).await.unwrap_err();
    assert!(matches!(
        err,
        TournamentError::InsufficientTeams {
            needed: 2,
            current: 1
        }
    ));

    let t = manager.get_tournament(id).await.unwrap();
    assert_eq!(t.status(), TournamentStatus::Upcoming);
    assert!(t.matches.is_empty());
}

#[tokio::test]
async fn test_score_rules() {
    let manager = manager();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 4, &[1, 2, 3]).await;
    let matches = manager.generate_schedule(id).await.unwrap();
    let m = &matches[0];

    assert!(matches!(
        manager.record_match_score(m.id, 1, 1).await,
        Err(TournamentError::EqualScores(1))
    ));

    let live = manager.report_live_score(m.id, 1, 1).await.unwrap();
    assert_eq!(live.status, MatchStatus::Ongoing);
    assert_eq!(live.scores(), (1, 1));

    let done = manager.record_match_score(m.id, 3, 1).await.unwrap();
    assert_eq!(done.winner, Some(m.team1.team_id));
    let version = manager.get_tournament(id).await.unwrap().version;

    // Same result again is accepted without another write.
    manager.record_match_score(m.id, 3, 1).await.unwrap();
    assert_eq!(manager.get_tournament(id).await.unwrap().version, version);

    assert!(matches!(
        manager.record_match_score(m.id, 1, 3).await,
        Err(TournamentError::ResultAlreadyRecorded(_))
    ));
    assert!(matches!(
        manager.report_live_score(m.id, 4, 1).await,
        Err(TournamentError::MatchClosed(_, MatchStatus::Completed))
    ));

    let winner = manager.get_standings(id).await.unwrap()[0].clone();
    assert_eq!(winner.team_id, m.team1.team_id);
    assert_eq!(winner.points, 3);
}

#[tokio::test]
async fn test_scores_rejected_after_cancel() {
    let manager = manager();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 4, &[1, 2]).await;
    let matches = manager.generate_schedule(id).await.unwrap();
    manager.cancel_tournament(id).await.unwrap();

    let err = manager
        .record_match_score(matches[0].id, 2, 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TournamentError::InvalidState {
            actual: TournamentStatus::Cancelled,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unknown_match() {
    let manager = manager();
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        manager.record_match_score(missing, 1, 0).await,
        Err(TournamentError::MatchNotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn test_lifecycle_transitions() {
    let (manager, mut events) = manager_with_events();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 4, &[1, 2]).await;
    drain(&mut events);

    assert!(matches!(
        manager.end_tournament(id).await,
        Err(TournamentError::InvalidState {
            expected: TournamentStatus::Ongoing,
            actual: TournamentStatus::Upcoming
        })
    ));

    manager.start_tournament(id).await.unwrap();
    assert!(matches!(
        manager.start_tournament(id).await,
        Err(TournamentError::InvalidState { .. })
    ));

    // Dates still say upcoming, so releasing the override reverts the start.
    let reset = manager.reset_manual_override(id).await.unwrap();
    assert!(!reset.manual_override());
    assert_eq!(reset.status(), TournamentStatus::Upcoming);

    let cancelled = manager.cancel_tournament(id).await.unwrap();
    assert_eq!(cancelled.status(), TournamentStatus::Cancelled);

    let reset = manager.reset_manual_override(id).await.unwrap();
    assert_eq!(reset.status(), TournamentStatus::Cancelled);

    let received = drain(&mut events);
    assert_eq!(
        received.last(),
        Some(&TournamentEvent::TournamentCancelled { tournament_id: id })
    );
}

#[tokio::test]
async fn test_completed_tournament_cannot_be_cancelled() {
    let manager = manager();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 4, &[1, 2]).await;
    manager.start_tournament(id).await.unwrap();
    manager.end_tournament(id).await.unwrap();

    assert!(matches!(
        manager.cancel_tournament(id).await,
        Err(TournamentError::InvalidTransition {
            from: TournamentStatus::Completed,
            to: TournamentStatus::Cancelled
        })
    ));
}

#[tokio::test]
async fn test_status_follows_dates() {
    let manager = manager();
    let start = Utc::now() - Duration::hours(2);
    let running = manager
        .create_tournament(TournamentConfig::new(
            "Already Running",
            TournamentFormat::RoundRobin,
            4,
            start,
            start + Duration::days(1),
        ))
        .await
        .unwrap();
    assert_eq!(running.status(), TournamentStatus::Ongoing);

    let start = Utc::now() - Duration::days(3);
    let finished = manager
        .create_tournament(TournamentConfig::new(
            "Last Week",
            TournamentFormat::RoundRobin,
            4,
            start,
            start + Duration::days(1),
        ))
        .await
        .unwrap();
    assert_eq!(finished.status(), TournamentStatus::Completed);

    let upcoming = manager
        .create_tournament(config(TournamentFormat::RoundRobin, 4))
        .await
        .unwrap();

    let ongoing = manager
        .list_tournaments(Some(TournamentStatus::Ongoing))
        .await
        .unwrap();
    assert_eq!(ongoing.len(), 1);
    assert_eq!(ongoing[0].id, running.id);
    assert_eq!(manager.list_tournaments(None).await.unwrap().len(), 3);

    // Nothing is stale, so a recompute pass changes nothing.
    assert_eq!(manager.recompute_all_statuses(Utc::now()).await.unwrap(), 0);

    // A week later the upcoming one is running.
    let later = Utc::now() + Duration::days(8);
    assert!(manager.recompute_all_statuses(later).await.unwrap() >= 1);
    let t = manager.get_tournament(upcoming.id).await.unwrap();
    assert_ne!(t.status(), TournamentStatus::Upcoming);
}

#[tokio::test]
async fn test_manual_status_survives_recompute() {
    let manager = manager();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 4, &[1, 2]).await;
    manager.start_tournament(id).await.unwrap();

    assert_eq!(manager.recompute_all_statuses(Utc::now()).await.unwrap(), 0);
    let t = manager.get_tournament(id).await.unwrap();
    assert_eq!(t.status(), TournamentStatus::Ongoing);
    assert!(t.manual_override());
}

#[tokio::test]
async fn test_delete_tournament() {
    let manager = manager();
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 4, &[1, 2]).await;
    let matches = manager.generate_schedule(id).await.unwrap();

    manager.delete_tournament(id).await.unwrap();

    assert!(matches!(
        manager.get_tournament(id).await,
        Err(TournamentError::TournamentNotFound(_))
    ));
    assert!(matches!(
        manager.record_match_score(matches[0].id, 1, 0).await,
        Err(TournamentError::MatchNotFound(_))
    ));
    assert!(matches!(
        manager.delete_tournament(id).await,
        Err(TournamentError::TournamentNotFound(_))
    ));
}

#[tokio::test]
async fn test_schedule_dates_follow_default_spacing() {
    let manager = manager().with_default_schedule(open_bracket::tournament::ScheduleSettings {
        match_duration_mins: 30,
        break_between_matches_mins: 10,
    });
    let id = create_with_teams(&manager, TournamentFormat::RoundRobin, 4, &[1, 2, 3]).await;
    let t = manager.get_tournament(id).await.unwrap();

    let matches = manager.generate_schedule(id).await.unwrap();
    assert_eq!(matches.len(), 3);
    for (i, m) in matches.iter().enumerate() {
        assert_eq!(
            m.scheduled_date,
            t.start_date + Duration::minutes(40 * i as i64)
        );
    }
}
