//! Repository trait definitions for testability and dependency injection.
//!
//! The manager only talks to these traits. PostgreSQL implementations live
//! here; in-memory ones are in [`super::memory`].

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_default_timeout, with_timeout};
use crate::tournament::{
    Match, MatchId, MatchSide, MatchStatus, TeamId, Tournament, TournamentError, TournamentId,
    TournamentResult, TournamentStatus,
};

/// Durable storage for tournaments and their matches
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// Store a new tournament and return its assigned ID
    async fn insert(&self, tournament: &Tournament) -> TournamentResult<TournamentId>;

    /// Load a tournament by ID
    async fn load(&self, id: TournamentId) -> TournamentResult<Option<Tournament>>;

    /// All tournaments, optionally only those with the given status
    async fn list(&self, status: Option<TournamentStatus>) -> TournamentResult<Vec<Tournament>>;

    /// Load a single match
    async fn load_match(&self, match_id: MatchId) -> TournamentResult<Option<Match>>;

    /// Matches of a tournament ordered by match number
    async fn load_matches(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Match>>;

    /// Atomically write the tournament and the given new or changed matches.
    ///
    /// The write only succeeds when the stored version still equals
    /// `tournament.version`. Returns the new version.
    ///
    /// # Errors
    ///
    /// * `TournamentError::ConcurrentModification` - Stored version moved on
    async fn save(&self, tournament: &Tournament, matches: &[Match]) -> TournamentResult<i64>;

    /// Delete a tournament and all its matches. Returns whether it existed.
    async fn delete(&self, id: TournamentId) -> TournamentResult<bool>;
}

/// Lookup of teams known to the wider system
#[async_trait]
pub trait TeamRoster: Send + Sync {
    async fn team_exists(&self, team_id: TeamId) -> TournamentResult<bool>;
}

/// PostgreSQL implementation of [`TournamentRepository`].
///
/// The tournament is stored as a JSONB document next to a few columns used
/// for filtering; matches live in their own table.
pub struct PgTournamentRepository {
    pool: PgPool,
}

impl PgTournamentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TOURNAMENT_COLUMNS: &str = "id, version, document";

const MATCH_COLUMNS: &str = "id, tournament_id, round, match_number, team1_id, team1_score, \
                             team2_id, team2_score, status, winner_id, scheduled_date";

fn tournament_from_row(row: &PgRow) -> TournamentResult<Tournament> {
    let document: serde_json::Value = row.try_get("document")?;
    let mut tournament: Tournament = serde_json::from_value(document)?;
    tournament.id = row.try_get("id")?;
    tournament.version = row.try_get("version")?;
    Ok(tournament)
}

fn match_from_row(row: &PgRow) -> TournamentResult<Match> {
    let status: String = row.try_get("status")?;
    let status = MatchStatus::parse(&status).ok_or_else(|| {
        TournamentError::CorruptRecord(format!("unknown match status {status:?}"))
    })?;

    Ok(Match {
        id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        round: column_u32(row, "round")?,
        match_number: column_u32(row, "match_number")?,
        team1: MatchSide {
            team_id: row.try_get("team1_id")?,
            score: column_u32(row, "team1_score")?,
        },
        team2: MatchSide {
            team_id: row.try_get("team2_id")?,
            score: column_u32(row, "team2_score")?,
        },
        status,
        winner: row.try_get("winner_id")?,
        scheduled_date: row.try_get("scheduled_date")?,
    })
}

fn column_u32(row: &PgRow, column: &str) -> TournamentResult<u32> {
    let value: i32 = row.try_get(column)?;
    u32::try_from(value)
        .map_err(|_| TournamentError::CorruptRecord(format!("negative {column}: {value}")))
}

/// Postgres has no unsigned integers; values past `i32::MAX` are refused
fn bind_u32(value: u32, column: &str) -> TournamentResult<i32> {
    i32::try_from(value)
        .map_err(|_| TournamentError::CorruptRecord(format!("{column} out of range: {value}")))
}

#[async_trait]
impl TournamentRepository for PgTournamentRepository {
    async fn insert(&self, tournament: &Tournament) -> TournamentResult<TournamentId> {
        let document = serde_json::to_value(tournament)?;

        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO tournaments
                    (name, format, status, manual_override, start_date, end_date, document,
                     version, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9)
                RETURNING id
                "#,
            )
            .bind(&tournament.name)
            .bind(tournament.format.as_str())
            .bind(tournament.status().as_str())
            .bind(tournament.manual_override())
            .bind(tournament.start_date)
            .bind(tournament.end_date)
            .bind(document)
            .bind(tournament.created_at)
            .bind(tournament.updated_at)
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(row.try_get("id")?)
    }

    async fn load(&self, id: TournamentId) -> TournamentResult<Option<Tournament>> {
        let query = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1");
        let row = with_default_timeout(sqlx::query(&query).bind(id).fetch_optional(&self.pool))
            .await?;

        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn list(&self, status: Option<TournamentStatus>) -> TournamentResult<Vec<Tournament>> {
        let query = format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments \
             WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY start_date, id"
        );
        let rows = with_default_timeout(
            sqlx::query(&query)
                .bind(status.map(TournamentStatus::as_str))
                .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(tournament_from_row).collect()
    }

    async fn load_match(&self, match_id: MatchId) -> TournamentResult<Option<Match>> {
        let query = format!("SELECT {MATCH_COLUMNS} FROM tournament_matches WHERE id = $1");
        let row = with_default_timeout(
            sqlx::query(&query)
                .bind(match_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    async fn load_matches(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Match>> {
        let query = format!(
            "SELECT {MATCH_COLUMNS} FROM tournament_matches \
             WHERE tournament_id = $1 ORDER BY match_number"
        );
        let rows = with_default_timeout(
            sqlx::query(&query)
                .bind(tournament_id)
                .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    async fn save(&self, tournament: &Tournament, matches: &[Match]) -> TournamentResult<i64> {
        let document = serde_json::to_value(tournament)?;

        let mut rows = Vec::with_capacity(matches.len());
        for m in matches {
            rows.push((
                m,
                bind_u32(m.round, "round")?,
                bind_u32(m.match_number, "match_number")?,
                bind_u32(m.team1.score, "team1_score")?,
                bind_u32(m.team2.score, "team2_score")?,
            ));
        }

        let pool = &self.pool;
        let saved = with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = pool.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE tournaments
                SET name = $1, format = $2, status = $3, manual_override = $4,
                    start_date = $5, end_date = $6, document = $7,
                    version = version + 1, updated_at = $8
                WHERE id = $9 AND version = $10
                RETURNING version
                "#,
            )
            .bind(&tournament.name)
            .bind(tournament.format.as_str())
            .bind(tournament.status().as_str())
            .bind(tournament.manual_override())
            .bind(tournament.start_date)
            .bind(tournament.end_date)
            .bind(document)
            .bind(tournament.updated_at)
            .bind(tournament.id)
            .bind(tournament.version)
            .fetch_optional(&mut *tx)
            .await?;

            // Dropping the transaction rolls it back.
            let Some(updated) = updated else {
                return Ok(None);
            };

            for (m, round, match_number, team1_score, team2_score) in rows {
                sqlx::query(
                    r#"
                    INSERT INTO tournament_matches
                        (id, tournament_id, round, match_number, team1_id, team1_score,
                         team2_id, team2_score, status, winner_id, scheduled_date)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    ON CONFLICT (id) DO UPDATE
                    SET team1_score = EXCLUDED.team1_score,
                        team2_score = EXCLUDED.team2_score,
                        status = EXCLUDED.status,
                        winner_id = EXCLUDED.winner_id,
                        scheduled_date = EXCLUDED.scheduled_date
                    "#,
                )
                .bind(m.id)
                .bind(m.tournament_id)
                .bind(round)
                .bind(match_number)
                .bind(m.team1.team_id)
                .bind(team1_score)
                .bind(m.team2.team_id)
                .bind(team2_score)
                .bind(m.status.as_str())
                .bind(m.winner)
                .bind(m.scheduled_date)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok::<Option<i64>, sqlx::Error>(Some(updated.try_get("version")?))
        })
        .await?;

        saved.ok_or_else(|| {
            log::warn!(
                "Tournament {}: stale write at version {} rejected",
                tournament.id,
                tournament.version
            );
            TournamentError::ConcurrentModification(tournament.id)
        })
    }

    async fn delete(&self, id: TournamentId) -> TournamentResult<bool> {
        let result = with_default_timeout(
            sqlx::query("DELETE FROM tournaments WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// PostgreSQL implementation of [`TeamRoster`] over the `teams` table
pub struct PgTeamRoster {
    pool: PgPool,
}

impl PgTeamRoster {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamRoster for PgTeamRoster {
    async fn team_exists(&self, team_id: TeamId) -> TournamentResult<bool> {
        let row = with_default_timeout(
            sqlx::query("SELECT EXISTS(SELECT 1 FROM teams WHERE id = $1) AS present")
                .bind(team_id)
                .fetch_one(&self.pool),
        )
        .await?;

        Ok(row.try_get("present")?)
    }
}
