//! Tournament data models: tournaments, registrations, standings and matches.

use super::bracket::Bracket;
use super::errors::{TournamentError, TournamentResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tournament ID type
pub type TournamentId = i64;

/// Team ID type
pub type TeamId = i64;

/// Match ID type
pub type MatchId = Uuid;

/// Competition format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentFormat {
    /// Knockout, one loss eliminates
    SingleElimination,
    /// Knockout with a losers' bracket
    DoubleElimination,
    /// Every team plays every other team once
    RoundRobin,
}

impl TournamentFormat {
    /// Whether this format is played through an elimination bracket
    pub fn is_elimination(self) -> bool {
        !matches!(self, Self::RoundRobin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleElimination => "single_elimination",
            Self::DoubleElimination => "double_elimination",
            Self::RoundRobin => "round_robin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single_elimination" => Some(Self::SingleElimination),
            "double_elimination" => Some(Self::DoubleElimination),
            "round_robin" => Some(Self::RoundRobin),
            _ => None,
        }
    }
}

impl fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tournament lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// Accepting registrations
    Upcoming,
    /// Matches are being played
    Ongoing,
    /// Tournament finished
    Completed,
    /// Tournament cancelled
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "upcoming" => Some(Self::Upcoming),
            "ongoing" => Some(Self::Ongoing),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who decides the tournament status.
///
/// `Auto` statuses follow the start/end dates and are recomputed before every
/// save and by the periodic scheduler. `Manual` statuses were set by an
/// explicit lifecycle action and stay put until the override is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "status", rename_all = "snake_case")]
pub enum StatusControl {
    Auto(TournamentStatus),
    Manual(TournamentStatus),
}

impl StatusControl {
    /// The effective status
    pub fn status(self) -> TournamentStatus {
        match self {
            Self::Auto(status) | Self::Manual(status) => status,
        }
    }

    pub fn is_manual(self) -> bool {
        matches!(self, Self::Manual(_))
    }
}

/// Admission state of a registered team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    /// Registered, awaiting approval
    Registered,
    /// Approved by an organiser
    Confirmed,
    /// Knocked out of the bracket
    Eliminated,
    /// Left the tournament
    Withdrawn,
}

impl AdmissionStatus {
    /// Whether a team in this state takes part in scheduling
    pub fn is_admitted(self) -> bool {
        matches!(self, Self::Registered | Self::Confirmed)
    }
}

/// Tournament registration entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRegistration {
    pub team_id: TeamId,
    pub registered_at: DateTime<Utc>,
    pub admission_status: AdmissionStatus,
}

/// A team's aggregated results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub team_id: TeamId,
    /// 1-based rank, 0 until the first recompute
    pub rank: u32,
    pub points: u32,
    pub wins: u32,
    pub losses: u32,
}

impl Standing {
    /// Create a zeroed standing for a newly registered team
    pub fn new(team_id: TeamId) -> Self {
        Self {
            team_id,
            rank: 0,
            points: 0,
            wins: 0,
            losses: 0,
        }
    }
}

/// Spacing of generated matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Expected length of one match in minutes
    pub match_duration_mins: i64,
    /// Gap between consecutive matches in minutes
    pub break_between_matches_mins: i64,
}

impl ScheduleSettings {
    /// Offset between the scheduled dates of consecutive matches
    pub fn slot_offset(&self) -> Duration {
        Duration::minutes(self.match_duration_mins + self.break_between_matches_mins)
    }

    /// # Errors
    ///
    /// * `TournamentError::InvalidConfig` - Non-positive duration or negative break
    pub fn validate(&self) -> TournamentResult<()> {
        if self.match_duration_mins <= 0 || self.break_between_matches_mins < 0 {
            return Err(TournamentError::InvalidConfig(
                "match duration must be positive and breaks non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            match_duration_mins: 60,
            break_between_matches_mins: 15,
        }
    }
}

/// Parameters for creating a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub name: String,
    pub format: TournamentFormat,
    pub max_teams: usize,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Match spacing; the manager's default applies when unset
    pub schedule: Option<ScheduleSettings>,
}

impl TournamentConfig {
    /// Create a configuration without explicit match spacing
    pub fn new(
        name: impl Into<String>,
        format: TournamentFormat,
        max_teams: usize,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            format,
            max_teams,
            start_date,
            end_date,
            schedule: None,
        }
    }

    /// Override the match spacing
    pub fn with_schedule(mut self, schedule: ScheduleSettings) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidConfig` - Empty name, fewer than two team
    ///   slots, end before start, or non-positive match spacing
    pub fn validate(&self) -> TournamentResult<()> {
        if self.name.trim().is_empty() {
            return Err(TournamentError::InvalidConfig(
                "name must not be empty".to_string(),
            ));
        }

        if self.max_teams < 2 {
            return Err(TournamentError::InvalidConfig(format!(
                "max_teams must be at least 2, got {}",
                self.max_teams
            )));
        }

        if self.end_date < self.start_date {
            return Err(TournamentError::InvalidConfig(
                "end_date must not precede start_date".to_string(),
            ));
        }

        if let Some(schedule) = &self.schedule {
            schedule.validate()?;
        }

        Ok(())
    }
}

/// A tournament and everything it owns apart from the match records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub format: TournamentFormat,
    pub max_teams: usize,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub schedule: ScheduleSettings,
    pub status: StatusControl,
    /// Registrations in registration order
    pub registered_teams: Vec<TeamRegistration>,
    /// IDs of the persisted matches, in creation order
    pub matches: Vec<MatchId>,
    pub standings: Vec<Standing>,
    pub bracket: Option<Bracket>,
    /// Optimistic concurrency version, bumped on every save
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tournament {
    /// Build a fresh `upcoming` tournament from its configuration
    pub fn from_config(id: TournamentId, config: TournamentConfig, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: config.name,
            format: config.format,
            max_teams: config.max_teams,
            start_date: config.start_date,
            end_date: config.end_date,
            schedule: config.schedule.unwrap_or_default(),
            status: StatusControl::Auto(TournamentStatus::Upcoming),
            registered_teams: Vec::new(),
            matches: Vec::new(),
            standings: Vec::new(),
            bracket: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current effective status
    pub fn status(&self) -> TournamentStatus {
        self.status.status()
    }

    /// Whether date-based status recomputation is suppressed
    pub fn manual_override(&self) -> bool {
        self.status.is_manual()
    }

    /// Teams eligible to play, in registration order
    pub fn admitted_teams(&self) -> Vec<TeamId> {
        self.registered_teams
            .iter()
            .filter(|r| r.admission_status.is_admitted())
            .map(|r| r.team_id)
            .collect()
    }

    pub fn registration(&self, team_id: TeamId) -> Option<&TeamRegistration> {
        self.registered_teams.iter().find(|r| r.team_id == team_id)
    }

    pub fn standing(&self, team_id: TeamId) -> Option<&Standing> {
        self.standings.iter().find(|s| s.team_id == team_id)
    }

    /// Mark a team as knocked out, if it is still admitted
    pub(crate) fn eliminate(&mut self, team_id: TeamId) {
        if let Some(registration) = self
            .registered_teams
            .iter_mut()
            .find(|r| r.team_id == team_id && r.admission_status.is_admitted())
        {
            registration.admission_status = AdmissionStatus::Eliminated;
        }
    }
}

/// Match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Ongoing,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "ongoing" => Some(Self::Ongoing),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One side of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSide {
    pub team_id: TeamId,
    pub score: u32,
}

impl MatchSide {
    pub fn new(team_id: TeamId) -> Self {
        Self { team_id, score: 0 }
    }
}

/// A persisted match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    /// 1-based round
    pub round: u32,
    /// Sequence number within the tournament
    pub match_number: u32,
    pub team1: MatchSide,
    pub team2: MatchSide,
    pub status: MatchStatus,
    pub winner: Option<TeamId>,
    pub scheduled_date: DateTime<Utc>,
}

impl Match {
    /// Create a pending match with zero scores
    pub fn new(
        tournament_id: TournamentId,
        round: u32,
        match_number: u32,
        team1: TeamId,
        team2: TeamId,
        scheduled_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            round,
            match_number,
            team1: MatchSide::new(team1),
            team2: MatchSide::new(team2),
            status: MatchStatus::Pending,
            winner: None,
            scheduled_date,
        }
    }

    /// Whether this match is between `a` and `b`, in either order
    pub fn pairs(&self, a: TeamId, b: TeamId) -> bool {
        (self.team1.team_id == a && self.team2.team_id == b)
            || (self.team1.team_id == b && self.team2.team_id == a)
    }

    pub fn scores(&self) -> (u32, u32) {
        (self.team1.score, self.team2.score)
    }

    /// The losing side of a decided match
    pub fn loser(&self) -> Option<TeamId> {
        let winner = self.winner?;
        if winner == self.team1.team_id {
            Some(self.team2.team_id)
        } else {
            Some(self.team1.team_id)
        }
    }

    /// Record final scores; the side with the strictly higher score wins.
    ///
    /// # Errors
    ///
    /// * `TournamentError::EqualScores` - Scores are level
    pub(crate) fn complete(
        &mut self,
        team1_score: u32,
        team2_score: u32,
    ) -> TournamentResult<TeamId> {
        if team1_score == team2_score {
            return Err(TournamentError::EqualScores(team1_score));
        }

        let winner = if team1_score > team2_score {
            self.team1.team_id
        } else {
            self.team2.team_id
        };

        self.team1.score = team1_score;
        self.team2.score = team2_score;
        self.winner = Some(winner);
        self.status = MatchStatus::Completed;

        Ok(winner)
    }

    /// Store a provisional score and mark the match as in progress.
    /// Level scores are fine here.
    pub(crate) fn set_live_score(&mut self, team1_score: u32, team2_score: u32) {
        self.team1.score = team1_score;
        self.team2.score = team2_score;
        self.status = MatchStatus::Ongoing;
    }
}
