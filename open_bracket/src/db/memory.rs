//! In-memory repositories for tests and embedders without a database.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::repository::{TeamRoster, TournamentRepository};
use crate::tournament::{
    Match, MatchId, TeamId, Tournament, TournamentError, TournamentId, TournamentResult,
    TournamentStatus,
};

/// [`TournamentRepository`] backed by hash maps, with the same version
/// check as the PostgreSQL implementation
#[derive(Default)]
pub struct InMemoryTournamentRepository {
    tournaments: RwLock<HashMap<TournamentId, Tournament>>,
    matches: RwLock<HashMap<MatchId, Match>>,
    next_id: AtomicI64,
}

impl InMemoryTournamentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TournamentRepository for InMemoryTournamentRepository {
    async fn insert(&self, tournament: &Tournament) -> TournamentResult<TournamentId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stored = tournament.clone();
        stored.id = id;
        stored.version = 0;
        self.tournaments.write().await.insert(id, stored);
        Ok(id)
    }

    async fn load(&self, id: TournamentId) -> TournamentResult<Option<Tournament>> {
        Ok(self.tournaments.read().await.get(&id).cloned())
    }

    async fn list(&self, status: Option<TournamentStatus>) -> TournamentResult<Vec<Tournament>> {
        let tournaments = self.tournaments.read().await;
        let mut listed: Vec<Tournament> = tournaments
            .values()
            .filter(|t| status.is_none_or(|s| t.status() == s))
            .cloned()
            .collect();
        listed.sort_by_key(|t| (t.start_date, t.id));
        Ok(listed)
    }

    async fn load_match(&self, match_id: MatchId) -> TournamentResult<Option<Match>> {
        Ok(self.matches.read().await.get(&match_id).cloned())
    }

    async fn load_matches(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Match>> {
        let matches = self.matches.read().await;
        let mut found: Vec<Match> = matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.match_number);
        Ok(found)
    }

    async fn save(&self, tournament: &Tournament, matches: &[Match]) -> TournamentResult<i64> {
        // Lock order: tournaments, then matches.
        let mut tournaments = self.tournaments.write().await;
        let stored = tournaments
            .get_mut(&tournament.id)
            .filter(|stored| stored.version == tournament.version)
            .ok_or_else(|| {
                log::warn!(
                    "Tournament {}: stale write at version {} rejected",
                    tournament.id,
                    tournament.version
                );
                TournamentError::ConcurrentModification(tournament.id)
            })?;

        let version = tournament.version + 1;
        *stored = tournament.clone();
        stored.version = version;

        let mut stored_matches = self.matches.write().await;
        for m in matches {
            stored_matches.insert(m.id, m.clone());
        }

        Ok(version)
    }

    async fn delete(&self, id: TournamentId) -> TournamentResult<bool> {
        let mut tournaments = self.tournaments.write().await;
        if tournaments.remove(&id).is_none() {
            return Ok(false);
        }
        self.matches
            .write()
            .await
            .retain(|_, m| m.tournament_id != id);
        Ok(true)
    }
}

/// [`TeamRoster`] over a fixed set of team IDs
#[derive(Default)]
pub struct InMemoryTeamRoster {
    teams: RwLock<HashSet<TeamId>>,
}

impl InMemoryTeamRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roster pre-filled with the given teams
    pub fn with_teams(teams: impl IntoIterator<Item = TeamId>) -> Self {
        Self {
            teams: RwLock::new(teams.into_iter().collect()),
        }
    }

    pub async fn add_team(&self, team_id: TeamId) {
        self.teams.write().await.insert(team_id);
    }
}

#[async_trait]
impl TeamRoster for InMemoryTeamRoster {
    async fn team_exists(&self, team_id: TeamId) -> TournamentResult<bool> {
        Ok(self.teams.read().await.contains(&team_id))
    }
}
