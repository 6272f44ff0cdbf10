//! Points and ranking.

use super::errors::{TournamentError, TournamentResult};
use super::models::{TeamId, Tournament};

/// Points awarded for a win
pub const POINTS_PER_WIN: u32 = 3;

/// Credit a decided match: the winner gains a win and [`POINTS_PER_WIN`],
/// the loser gains a loss.
///
/// # Errors
///
/// * `TournamentError::NotRegistered` - Either team has no standing entry
pub fn record_result(
    tournament: &mut Tournament,
    winner: TeamId,
    loser: TeamId,
) -> TournamentResult<()> {
    let winner_idx = standing_index(tournament, winner)?;
    let loser_idx = standing_index(tournament, loser)?;

    let entry = &mut tournament.standings[winner_idx];
    entry.wins += 1;
    entry.points += POINTS_PER_WIN;

    tournament.standings[loser_idx].losses += 1;

    Ok(())
}

/// Sort by points then wins, both descending, keeping the previous order for
/// ties, and assign ranks from 1.
pub fn recompute(tournament: &mut Tournament) {
    tournament
        .standings
        .sort_by(|a, b| b.points.cmp(&a.points).then(b.wins.cmp(&a.wins)));

    for (index, standing) in tournament.standings.iter_mut().enumerate() {
        standing.rank = index as u32 + 1;
    }
}

fn standing_index(tournament: &Tournament, team_id: TeamId) -> TournamentResult<usize> {
    tournament
        .standings
        .iter()
        .position(|s| s.team_id == team_id)
        .ok_or(TournamentError::NotRegistered(team_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::models::{Standing, TournamentConfig, TournamentFormat};
    use chrono::{Duration, TimeZone, Utc};

    fn tournament(teams: &[TeamId]) -> Tournament {
        let now = Utc.with_ymd_and_hms(2026, 2, 14, 20, 0, 0).unwrap();
        let config = TournamentConfig::new(
            "Winter League",
            TournamentFormat::RoundRobin,
            16,
            now,
            now + Duration::days(30),
        );
        let mut t = Tournament::from_config(11, config, now);
        t.standings = teams.iter().map(|&id| Standing::new(id)).collect();
        t
    }

    #[test]
    fn test_record_result_awards_points() {
        let mut t = tournament(&[1, 2]);
        record_result(&mut t, 2, 1).unwrap();

        let winner = t.standing(2).unwrap();
        assert_eq!((winner.wins, winner.points, winner.losses), (1, 3, 0));
        let loser = t.standing(1).unwrap();
        assert_eq!((loser.wins, loser.points, loser.losses), (0, 0, 1));
    }

    #[test]
    fn test_record_result_unknown_team_changes_nothing() {
        let mut t = tournament(&[1, 2]);
        assert!(matches!(
            record_result(&mut t, 1, 9),
            Err(TournamentError::NotRegistered(9))
        ));
        assert_eq!(t.standing(1).unwrap().wins, 0);
    }

    #[test]
    fn test_recompute_orders_by_points_then_wins() {
        let mut t = tournament(&[1, 2, 3, 4]);
        t.standings[0].points = 3;
        t.standings[0].wins = 1;
        t.standings[1].points = 6;
        t.standings[1].wins = 1;
        t.standings[2].points = 3;
        t.standings[2].wins = 2;

        recompute(&mut t);

        let order: Vec<TeamId> = t.standings.iter().map(|s| s.team_id).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);
        let ranks: Vec<u32> = t.standings.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_recompute_is_stable_for_full_ties() {
        let mut t = tournament(&[5, 3, 8]);
        recompute(&mut t);
        let order: Vec<TeamId> = t.standings.iter().map(|s| s.team_id).collect();
        assert_eq!(order, vec![5, 3, 8]);
    }
}
