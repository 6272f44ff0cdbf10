//! Match schedule generation.

use super::errors::{TournamentError, TournamentResult};
use super::models::{Match, TeamId, Tournament, TournamentFormat};

/// Build the opening matches for a tournament and append their IDs to it.
///
/// Only teams still admitted take part, in registration order. Round-robin
/// creates one match per unordered pair; elimination formats pair
/// consecutive teams for round 1 and leave later rounds to the bracket.
/// With an odd team count the last team gets no round-1 match here.
///
/// # Errors
///
/// * `TournamentError::ScheduleExists` - Tournament already has matches
/// * `TournamentError::InsufficientTeams` - Fewer than two admitted teams
pub fn generate(tournament: &mut Tournament) -> TournamentResult<Vec<Match>> {
    if !tournament.matches.is_empty() {
        return Err(TournamentError::ScheduleExists);
    }

    let teams = tournament.admitted_teams();
    if teams.len() < 2 {
        return Err(TournamentError::InsufficientTeams {
            needed: 2,
            current: teams.len(),
        });
    }

    let fixtures: Vec<(u32, TeamId, TeamId)> = match tournament.format {
        TournamentFormat::RoundRobin => round_robin_fixtures(&teams),
        TournamentFormat::SingleElimination | TournamentFormat::DoubleElimination => {
            if teams.len() % 2 == 1 {
                log::warn!(
                    "Tournament {}: odd team count, team {} has no round-1 match",
                    tournament.id,
                    teams[teams.len() - 1]
                );
            }
            teams
                .chunks_exact(2)
                .map(|pair| (1, pair[0], pair[1]))
                .collect()
        }
    };

    let offset = tournament.schedule.slot_offset();
    let mut scheduled_date = tournament.start_date;
    let mut matches = Vec::with_capacity(fixtures.len());

    for (index, (round, team1, team2)) in fixtures.into_iter().enumerate() {
        if index > 0 {
            scheduled_date += offset;
        }
        let m = Match::new(
            tournament.id,
            round,
            index as u32 + 1,
            team1,
            team2,
            scheduled_date,
        );
        tournament.matches.push(m.id);
        matches.push(m);
    }

    log::info!(
        "Tournament {}: generated {} {} matches",
        tournament.id,
        matches.len(),
        tournament.format
    );

    Ok(matches)
}

/// Every unordered pair once, ordered by (first, second) team index.
fn round_robin_fixtures(teams: &[TeamId]) -> Vec<(u32, TeamId, TeamId)> {
    let n = teams.len();
    let mut fixtures = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            fixtures.push((round_robin_round(i, j, n), teams[i], teams[j]));
        }
    }
    fixtures
}

/// Round in which indices `a < b` meet under the circle method, 1-based.
///
/// Each team plays at most once per round; with an odd count one team sits
/// out each round.
fn round_robin_round(a: usize, b: usize, n: usize) -> u32 {
    let slots = n + n % 2;
    let rounds = slots - 1;
    let round = if b == rounds {
        a
    } else {
        (a + b) * slots.div_ceil(2) % rounds
    };
    round as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::models::{
        AdmissionStatus, Standing, TeamRegistration, TournamentConfig,
    };
    use crate::tournament::registration;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::{HashMap, HashSet};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 12, 10, 0, 0).unwrap()
    }

    fn tournament(format: TournamentFormat, teams: i64) -> Tournament {
        let config = TournamentConfig::new(
            "Autumn Series",
            format,
            32,
            start(),
            start() + Duration::days(1),
        );
        let mut t = Tournament::from_config(3, config, start() - Duration::days(10));
        for team_id in 1..=teams {
            registration::register(&mut t, team_id, start() - Duration::days(5)).unwrap();
        }
        t
    }

    #[test]
    fn test_round_robin_five_teams_every_pair_once() {
        let mut t = tournament(TournamentFormat::RoundRobin, 5);
        let matches = generate(&mut t).unwrap();

        assert_eq!(matches.len(), 10);
        let pairs: HashSet<(i64, i64)> = matches
            .iter()
            .map(|m| {
                let (a, b) = (m.team1.team_id, m.team2.team_id);
                (a.min(b), a.max(b))
            })
            .collect();
        assert_eq!(pairs.len(), 10);
        assert_eq!(t.matches.len(), 10);
        assert_eq!(
            matches.iter().map(|m| m.match_number).collect::<Vec<_>>(),
            (1..=10).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_round_robin_dates_step_by_offset() {
        let mut t = tournament(TournamentFormat::RoundRobin, 4);
        let matches = generate(&mut t).unwrap();
        let offset = t.schedule.slot_offset();

        assert_eq!(matches[0].scheduled_date, start());
        for window in matches.windows(2) {
            assert_eq!(window[1].scheduled_date - window[0].scheduled_date, offset);
        }
    }

    #[test]
    fn test_round_robin_rounds_never_double_book() {
        for n in 2..=9 {
            let mut t = tournament(TournamentFormat::RoundRobin, n);
            let matches = generate(&mut t).unwrap();

            let mut per_round: HashMap<u32, Vec<i64>> = HashMap::new();
            for m in &matches {
                per_round
                    .entry(m.round)
                    .or_default()
                    .extend([m.team1.team_id, m.team2.team_id]);
            }

            let expected_rounds = (if n % 2 == 0 { n - 1 } else { n }) as usize;
            assert_eq!(per_round.len(), expected_rounds, "n = {n}");
            for teams in per_round.values() {
                let unique: HashSet<_> = teams.iter().collect();
                assert_eq!(unique.len(), teams.len(), "n = {n}");
            }
        }
    }

    #[test]
    fn test_single_elimination_odd_count_leaves_last_team_out() {
        let mut t = tournament(TournamentFormat::SingleElimination, 5);
        let matches = generate(&mut t).unwrap();

        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.round == 1));
        assert!(matches[0].pairs(1, 2));
        assert!(matches[1].pairs(3, 4));
        assert!(!matches.iter().any(|m| m.team1.team_id == 5 || m.team2.team_id == 5));
    }

    #[test]
    fn test_only_admitted_teams_are_scheduled() {
        let mut t = tournament(TournamentFormat::SingleElimination, 4);
        t.registered_teams[1].admission_status = AdmissionStatus::Withdrawn;
        t.registered_teams.push(TeamRegistration {
            team_id: 9,
            registered_at: start(),
            admission_status: AdmissionStatus::Confirmed,
        });
        t.standings.push(Standing::new(9));

        let matches = generate(&mut t).unwrap();
        assert!(matches[0].pairs(1, 3));
        assert!(matches[1].pairs(4, 9));
    }

    #[test]
    fn test_schedule_exists() {
        let mut t = tournament(TournamentFormat::RoundRobin, 3);
        generate(&mut t).unwrap();
        assert!(matches!(
            generate(&mut t),
            Err(TournamentError::ScheduleExists)
        ));
        assert_eq!(t.matches.len(), 3);
    }

    #[test]
    fn test_insufficient_teams() {
        let mut t = tournament(TournamentFormat::RoundRobin, 1);
        assert!(matches!(
            generate(&mut t),
            Err(TournamentError::InsufficientTeams {
                needed: 2,
                current: 1
            })
        ));
    }
}
