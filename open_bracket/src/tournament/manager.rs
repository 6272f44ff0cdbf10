//! Tournament manager: the public operations over stored tournaments.
//!
//! Every mutating operation takes the tournament's lock, loads it, applies a
//! pure transition from the sibling modules, refreshes the date-driven
//! status and saves tournament and matches in one versioned write.
//! Notifications go out only after the save succeeded.

use super::bracket::{Advancement, Bracket};
use super::errors::{TournamentError, TournamentResult};
use super::models::{
    Match, MatchId, MatchStatus, ScheduleSettings, Standing, TeamId, Tournament, TournamentConfig,
    TournamentId, TournamentStatus,
};
use super::{lifecycle, registration, schedule, standings};
use crate::db::{TeamRoster, TournamentRepository};
use crate::notify::{TournamentEvent, TournamentNotifier};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    repository: Arc<dyn TournamentRepository>,
    roster: Arc<dyn TeamRoster>,
    notifier: Arc<dyn TournamentNotifier>,
    /// Match spacing for tournaments created without their own
    default_schedule: ScheduleSettings,
    /// One mutex per tournament, created on first use
    locks: Arc<RwLock<HashMap<TournamentId, Arc<Mutex<()>>>>>,
}

impl TournamentManager {
    /// Create a new tournament manager
    pub fn new(
        repository: Arc<dyn TournamentRepository>,
        roster: Arc<dyn TeamRoster>,
        notifier: Arc<dyn TournamentNotifier>,
    ) -> Self {
        Self {
            repository,
            roster,
            notifier,
            default_schedule: ScheduleSettings::default(),
            locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Use `schedule` for tournaments created without explicit match spacing
    pub fn with_default_schedule(mut self, schedule: ScheduleSettings) -> Self {
        self.default_schedule = schedule;
        self
    }

    /// Create a new tournament
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidConfig` - Configuration failed validation
    pub async fn create_tournament(
        &self,
        mut config: TournamentConfig,
    ) -> TournamentResult<Tournament> {
        config.schedule.get_or_insert(self.default_schedule);
        config.validate()?;

        let now = Utc::now();
        let mut tournament = Tournament::from_config(0, config, now);
        lifecycle::refresh_status(&mut tournament, now);
        tournament.id = self.repository.insert(&tournament).await?;

        log::info!(
            "Tournament {} '{}' created ({}, up to {} teams)",
            tournament.id,
            tournament.name,
            tournament.format,
            tournament.max_teams
        );
        Ok(tournament)
    }

    /// Get a tournament by ID
    pub async fn get_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Tournament> {
        self.load(tournament_id).await
    }

    /// List tournaments, optionally filtered by status
    pub async fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> TournamentResult<Vec<Tournament>> {
        self.repository.list(status).await
    }

    /// Matches of a tournament ordered by match number
    pub async fn get_matches(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Match>> {
        self.load(tournament_id).await?;
        self.repository.load_matches(tournament_id).await
    }

    /// Current standings, in ranking order once ranks have been computed
    pub async fn get_standings(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<Standing>> {
        Ok(self.load(tournament_id).await?.standings)
    }

    pub async fn get_bracket(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<Bracket>> {
        Ok(self.load(tournament_id).await?.bracket)
    }

    /// Delete a tournament together with its matches
    pub async fn delete_tournament(&self, tournament_id: TournamentId) -> TournamentResult<()> {
        let guard = self.lock(tournament_id).await;
        let deleted = self.repository.delete(tournament_id).await?;
        drop(guard);
        self.locks.write().await.remove(&tournament_id);

        if !deleted {
            return Err(TournamentError::TournamentNotFound(tournament_id));
        }

        log::info!("Tournament {} deleted", tournament_id);
        Ok(())
    }

    /// Register a team for a tournament
    ///
    /// # Errors
    ///
    /// * `TournamentError::TeamNotFound` - Team is unknown to the roster
    /// * `TournamentError::DuplicateRegistration` - Team already registered
    /// * `TournamentError::TournamentFull` - No free slots
    /// * `TournamentError::RegistrationClosed` - Tournament is not `upcoming`
    pub async fn register_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> TournamentResult<()> {
        if !self.roster.team_exists(team_id).await? {
            return Err(TournamentError::TeamNotFound(team_id));
        }

        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;

        registration::register(&mut tournament, team_id, now)?;
        self.commit(&mut tournament, &[], now).await?;

        log::info!("Tournament {}: team {} registered", tournament_id, team_id);
        Ok(())
    }

    /// Remove a team's registration. Returns whether the team was registered.
    ///
    /// # Errors
    ///
    /// * `TournamentError::TeamInPlay` - Schedule or bracket exists; withdraw instead
    pub async fn unregister_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> TournamentResult<bool> {
        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;

        if !registration::unregister(&mut tournament, team_id)? {
            return Ok(false);
        }
        self.commit(&mut tournament, &[], now).await?;

        log::info!("Tournament {}: team {} unregistered", tournament_id, team_id);
        Ok(true)
    }

    /// Confirm a team's registration
    pub async fn approve_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> TournamentResult<()> {
        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;

        registration::approve(&mut tournament, team_id)?;
        self.commit(&mut tournament, &[], now).await?;

        log::info!("Tournament {}: team {} approved", tournament_id, team_id);
        self.dispatch(TournamentEvent::TeamApproved {
            tournament_id,
            team_id,
        })
        .await;
        Ok(())
    }

    /// Turn a team away, removing its registration
    ///
    /// # Errors
    ///
    /// * `TournamentError::NotRegistered` - Team is not in the list
    /// * `TournamentError::TeamInPlay` - Schedule or bracket exists; withdraw instead
    pub async fn reject_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> TournamentResult<()> {
        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;

        registration::reject(&mut tournament, team_id)?;
        self.commit(&mut tournament, &[], now).await?;

        log::info!("Tournament {}: team {} rejected", tournament_id, team_id);
        self.dispatch(TournamentEvent::TeamRejected {
            tournament_id,
            team_id,
        })
        .await;
        Ok(())
    }

    /// Mark a team as withdrawn; it keeps its slot but is no longer scheduled
    pub async fn withdraw_team(
        &self,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> TournamentResult<()> {
        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;

        registration::withdraw(&mut tournament, team_id)?;
        self.commit(&mut tournament, &[], now).await?;

        log::info!("Tournament {}: team {} withdrew", tournament_id, team_id);
        Ok(())
    }

    /// Create the opening matches
    ///
    /// # Errors
    ///
    /// * `TournamentError::ScheduleExists` - Tournament already has matches
    /// * `TournamentError::InsufficientTeams` - Fewer than two admitted teams
    pub async fn generate_schedule(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<Match>> {
        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;

        let matches = schedule::generate(&mut tournament)?;
        self.commit(&mut tournament, &matches, now).await?;

        log::info!(
            "Tournament {}: schedule saved with {} matches",
            tournament_id,
            matches.len()
        );
        Ok(matches)
    }

    /// Build the elimination bracket, replaying results already recorded
    /// for round-1 matches and creating matches whose teams are known.
    ///
    /// # Errors
    ///
    /// * `TournamentError::BracketExists` - Bracket already generated
    /// * `TournamentError::BracketNotSupported` - Round-robin tournament
    /// * `TournamentError::InsufficientTeams` - Fewer than two admitted teams
    pub async fn generate_bracket(&self, tournament_id: TournamentId) -> TournamentResult<Bracket> {
        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;
        let existing = self.repository.load_matches(tournament_id).await?;

        let created = attach_bracket(&mut tournament, &existing)?;
        self.commit(&mut tournament, &created, now).await?;

        let bracket = tournament.bracket.ok_or_else(|| {
            TournamentError::CorruptRecord("bracket missing after generation".into())
        })?;

        log::info!(
            "Tournament {}: bracket generated with {} rounds, {} byes",
            tournament_id,
            bracket.total_rounds,
            bracket.byes().len()
        );
        self.dispatch(TournamentEvent::BracketGenerated {
            tournament_id,
            total_rounds: bracket.total_rounds,
        })
        .await;
        Ok(bracket)
    }

    /// Record the final score of a match.
    ///
    /// Sets the winner, credits the standings and, for bracket matches,
    /// advances the winner, eliminates the loser and creates any match whose
    /// two teams are now known. Submitting the stored result again returns
    /// the match unchanged.
    ///
    /// # Errors
    ///
    /// * `TournamentError::MatchNotFound` - No such match
    /// * `TournamentError::EqualScores` - Scores are level
    /// * `TournamentError::ResultAlreadyRecorded` - Match has a different result
    /// * `TournamentError::MatchClosed` - Match was cancelled
    /// * `TournamentError::InvalidState` - Tournament completed or cancelled
    /// * `TournamentError::SlotConflict` - Bracket destination holds another team
    pub async fn record_match_score(
        &self,
        match_id: MatchId,
        team1_score: u32,
        team2_score: u32,
    ) -> TournamentResult<Match> {
        let tournament_id = self.find_match(match_id).await?.tournament_id;

        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;
        let existing = self.repository.load_matches(tournament_id).await?;
        let mut m = existing
            .iter()
            .find(|m| m.id == match_id)
            .cloned()
            .ok_or(TournamentError::MatchNotFound(match_id))?;

        match m.status {
            MatchStatus::Completed if m.scores() == (team1_score, team2_score) => {
                log::debug!("Match {} result already recorded", match_id);
                return Ok(m);
            }
            MatchStatus::Completed => return Err(TournamentError::ResultAlreadyRecorded(match_id)),
            MatchStatus::Cancelled => return Err(TournamentError::MatchClosed(match_id, m.status)),
            MatchStatus::Pending | MatchStatus::Ongoing => {}
        }
        ensure_accepting_scores(&tournament)?;

        let winner = m.complete(team1_score, team2_score)?;
        let loser = if winner == m.team1.team_id {
            m.team2.team_id
        } else {
            m.team1.team_id
        };

        standings::record_result(&mut tournament, winner, loser)?;
        standings::recompute(&mut tournament);

        let mut knocked_out = false;
        if let Some(bracket) = tournament.bracket.as_mut() {
            if bracket.contains(match_id) {
                match bracket.advance(match_id, winner, (team1_score, team2_score))? {
                    Advancement::Champion(champion) => {
                        log::info!(
                            "Tournament {}: team {} wins the bracket",
                            tournament_id,
                            champion
                        );
                    }
                    Advancement::Advanced { round, position, .. } => {
                        log::debug!(
                            "Tournament {}: team {} into round {} position {}",
                            tournament_id,
                            winner,
                            round,
                            position
                        );
                    }
                    Advancement::AlreadyApplied => {}
                }
                knocked_out = true;
            }
        }
        if knocked_out {
            tournament.eliminate(loser);
        }

        let mut changed = vec![m.clone()];
        changed.extend(materialize_ready(&mut tournament, &existing)?);
        self.commit(&mut tournament, &changed, now).await?;

        log::info!(
            "Tournament {}: match {} finished {}-{}, team {} wins",
            tournament_id,
            match_id,
            team1_score,
            team2_score,
            winner
        );
        Ok(m)
    }

    /// Store a provisional score for a match in progress
    ///
    /// # Errors
    ///
    /// * `TournamentError::MatchNotFound` - No such match
    /// * `TournamentError::MatchClosed` - Match completed or cancelled
    /// * `TournamentError::InvalidState` - Tournament completed or cancelled
    pub async fn report_live_score(
        &self,
        match_id: MatchId,
        team1_score: u32,
        team2_score: u32,
    ) -> TournamentResult<Match> {
        let tournament_id = self.find_match(match_id).await?.tournament_id;

        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;
        let mut m = self.find_match(match_id).await?;

        if matches!(m.status, MatchStatus::Completed | MatchStatus::Cancelled) {
            return Err(TournamentError::MatchClosed(match_id, m.status));
        }
        ensure_accepting_scores(&tournament)?;

        m.set_live_score(team1_score, team2_score);
        if let Some(bracket) = tournament.bracket.as_mut() {
            bracket.record_live_score(match_id, (team1_score, team2_score));
        }
        self.commit(&mut tournament, std::slice::from_ref(&m), now)
            .await?;

        log::debug!(
            "Tournament {}: match {} live {}-{}",
            tournament_id,
            match_id,
            team1_score,
            team2_score
        );
        Ok(m)
    }

    /// Start an `upcoming` tournament.
    ///
    /// Generates the schedule if there is none and, for elimination formats,
    /// the bracket.
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidState` - Tournament is not `upcoming`
    /// * `TournamentError::InsufficientTeams` - Fewer than two admitted teams
    pub async fn start_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Tournament> {
        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;

        lifecycle::start(&mut tournament)?;

        let mut created = Vec::new();
        if tournament.matches.is_empty() {
            created = schedule::generate(&mut tournament)?;
        }

        let mut bracket_rounds = None;
        if tournament.format.is_elimination() && tournament.bracket.is_none() {
            let mut known = self.repository.load_matches(tournament_id).await?;
            known.extend(created.iter().cloned());
            let extra = attach_bracket(&mut tournament, &known)?;
            created.extend(extra);
            bracket_rounds = tournament.bracket.as_ref().map(|b| b.total_rounds);
        }

        self.commit(&mut tournament, &created, now).await?;

        log::info!(
            "Tournament {} started with {} teams",
            tournament_id,
            tournament.admitted_teams().len()
        );
        if let Some(total_rounds) = bracket_rounds {
            self.dispatch(TournamentEvent::BracketGenerated {
                tournament_id,
                total_rounds,
            })
            .await;
        }
        self.dispatch(TournamentEvent::TournamentStarted { tournament_id })
            .await;
        Ok(tournament)
    }

    /// Finish an `ongoing` tournament and finalize the ranking
    pub async fn end_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Tournament> {
        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;

        lifecycle::end(&mut tournament)?;
        self.commit(&mut tournament, &[], now).await?;

        let leader = tournament.standings.first().map(|s| s.team_id);
        log::info!("Tournament {} completed", tournament_id);
        self.dispatch(TournamentEvent::TournamentCompleted {
            tournament_id,
            leader,
        })
        .await;
        Ok(tournament)
    }

    /// Cancel a tournament that has not completed
    pub async fn cancel_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Tournament> {
        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load_current(tournament_id, now).await?;

        lifecycle::cancel(&mut tournament)?;
        self.commit(&mut tournament, &[], now).await?;

        log::info!("Tournament {} cancelled", tournament_id);
        self.dispatch(TournamentEvent::TournamentCancelled { tournament_id })
            .await;
        Ok(tournament)
    }

    /// Return status control to the dates and recompute immediately
    pub async fn reset_manual_override(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Tournament> {
        let _guard = self.lock(tournament_id).await;
        let now = Utc::now();
        let mut tournament = self.load(tournament_id).await?;

        lifecycle::reset_override(&mut tournament, now);
        self.commit(&mut tournament, &[], now).await?;

        log::info!(
            "Tournament {}: manual override cleared, status {}",
            tournament_id,
            tournament.status()
        );
        Ok(tournament)
    }

    /// Recompute the date-driven status of every tournament not under manual
    /// control and not cancelled. Returns how many changed.
    ///
    /// A tournament that fails to update is logged and skipped.
    pub async fn recompute_all_statuses(&self, now: DateTime<Utc>) -> TournamentResult<usize> {
        let tournaments = self.repository.list(None).await?;

        let mut changed = 0;
        for tournament in tournaments {
            if tournament.manual_override() || tournament.status() == TournamentStatus::Cancelled {
                continue;
            }
            match self.refresh_one(tournament.id, now).await {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Tournament {}: status refresh failed: {}", tournament.id, e);
                }
            }
        }

        Ok(changed)
    }

    async fn refresh_one(
        &self,
        tournament_id: TournamentId,
        now: DateTime<Utc>,
    ) -> TournamentResult<bool> {
        let _guard = self.lock(tournament_id).await;
        let mut tournament = self.load(tournament_id).await?;
        if !lifecycle::refresh_status(&mut tournament, now) {
            return Ok(false);
        }
        self.commit(&mut tournament, &[], now).await?;
        log::info!(
            "Tournament {}: status now {} from dates",
            tournament_id,
            tournament.status()
        );
        Ok(true)
    }

    async fn lock(&self, tournament_id: TournamentId) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(&tournament_id).cloned();
        let lock = match existing {
            Some(lock) => lock,
            None => self
                .locks
                .write()
                .await
                .entry(tournament_id)
                .or_default()
                .clone(),
        };
        lock.lock_owned().await
    }

    async fn load(&self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        match self.repository.load(tournament_id).await? {
            Some(tournament) => Ok(tournament),
            None => {
                // Drop the lock entry an unknown id may have created
                self.locks.write().await.remove(&tournament_id);
                Err(TournamentError::TournamentNotFound(tournament_id))
            }
        }
    }

    /// Load with the date-driven status brought up to `now`
    async fn load_current(
        &self,
        tournament_id: TournamentId,
        now: DateTime<Utc>,
    ) -> TournamentResult<Tournament> {
        let mut tournament = self.load(tournament_id).await?;
        lifecycle::refresh_status(&mut tournament, now);
        Ok(tournament)
    }

    async fn find_match(&self, match_id: MatchId) -> TournamentResult<Match> {
        self.repository
            .load_match(match_id)
            .await?
            .ok_or(TournamentError::MatchNotFound(match_id))
    }

    async fn commit(
        &self,
        tournament: &mut Tournament,
        matches: &[Match],
        now: DateTime<Utc>,
    ) -> TournamentResult<()> {
        lifecycle::refresh_status(tournament, now);
        tournament.updated_at = now;
        tournament.version = self.repository.save(tournament, matches).await?;
        Ok(())
    }

    async fn dispatch(&self, event: TournamentEvent) {
        if let Err(e) = self.notifier.notify(&event).await {
            log::error!(
                "Tournament {}: failed to deliver {:?}: {}",
                event.tournament_id(),
                event,
                e
            );
        }
    }
}

fn ensure_accepting_scores(tournament: &Tournament) -> TournamentResult<()> {
    match tournament.status() {
        TournamentStatus::Upcoming | TournamentStatus::Ongoing => Ok(()),
        actual => Err(TournamentError::InvalidState {
            expected: TournamentStatus::Ongoing,
            actual,
        }),
    }
}

/// Generate the bracket, replay completed round-1 results into it and
/// create the matches that became playable.
fn attach_bracket(tournament: &mut Tournament, existing: &[Match]) -> TournamentResult<Vec<Match>> {
    if tournament.bracket.is_some() {
        return Err(TournamentError::BracketExists);
    }

    let teams = tournament.admitted_teams();
    let mut bracket = Bracket::generate(tournament.format, &teams, existing)?;

    let replay: Vec<&Match> = existing
        .iter()
        .filter(|m| m.status == MatchStatus::Completed && bracket.contains(m.id))
        .collect();

    let mut knocked_out = Vec::new();
    for m in replay {
        if let (Some(winner), Some(loser)) = (m.winner, m.loser()) {
            bracket.advance(m.id, winner, m.scores())?;
            knocked_out.push(loser);
        }
    }

    tournament.bracket = Some(bracket);
    for loser in knocked_out {
        tournament.eliminate(loser);
    }

    materialize_ready(tournament, existing)
}

/// Create and link a persisted match for every bracket match whose two
/// teams are known. Numbers and dates continue after `known`.
fn materialize_ready(tournament: &mut Tournament, known: &[Match]) -> TournamentResult<Vec<Match>> {
    let Some(bracket) = tournament.bracket.as_mut() else {
        return Ok(Vec::new());
    };

    let offset = tournament.schedule.slot_offset();
    let mut match_number = known.iter().map(|m| m.match_number).max().unwrap_or(0);
    let mut latest = known.iter().map(|m| m.scheduled_date).max();
    let mut created = Vec::new();

    for (round, position, team1, team2) in bracket.ready_matches() {
        match_number += 1;
        let scheduled_date = latest.map_or(tournament.start_date, |date| date + offset);
        latest = Some(scheduled_date);

        let m = Match::new(tournament.id, round, match_number, team1, team2, scheduled_date);
        bracket.link_match(round, position, m.id, scheduled_date)?;
        tournament.matches.push(m.id);

        log::debug!(
            "Tournament {}: created match {} for round {} position {} ({} vs {})",
            tournament.id,
            m.id,
            round,
            position,
            team1,
            team2
        );
        created.push(m);
    }

    Ok(created)
}
