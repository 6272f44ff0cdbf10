//! Elimination bracket: rounds, byes, placeholders and winner advancement.
//!
//! Round 1 is laid out over `capacity / 2` positions. The first `bye_count`
//! positions belong to bye teams, the rest to real matches. A result at
//! position `p` feeds position `p / 2` of the next round, on the `team1`
//! side when `p` is even and the `team2` side when odd. Byes are seeded into
//! round 2 by the same rule.

use super::errors::{TournamentError, TournamentResult};
use super::models::{Match, MatchId, MatchStatus, TeamId, TournamentFormat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bracket slot: a known team or a placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "team_id", rename_all = "snake_case")]
pub enum BracketSlot {
    Team(TeamId),
    /// To be decided by an earlier round
    Tbd,
}

impl BracketSlot {
    pub fn team(self) -> Option<TeamId> {
        match self {
            Self::Team(team_id) => Some(team_id),
            Self::Tbd => None,
        }
    }

    /// Display label, `TBD` for placeholders
    pub fn label(self) -> String {
        match self {
            Self::Team(team_id) => team_id.to_string(),
            Self::Tbd => "TBD".to_string(),
        }
    }
}

/// Which side of a match a slot is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Team1,
    Team2,
}

impl Side {
    fn for_position(position: usize) -> Self {
        if position % 2 == 0 { Self::Team1 } else { Self::Team2 }
    }
}

/// One match slot inside a bracket round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketMatch {
    /// Linked persisted match, once one exists
    pub match_id: Option<MatchId>,
    /// Index within the round
    pub position: usize,
    pub team1: BracketSlot,
    pub team2: BracketSlot,
    pub score: Option<(u32, u32)>,
    pub winner: Option<TeamId>,
    pub status: MatchStatus,
    pub scheduled_date: Option<DateTime<Utc>>,
}

impl BracketMatch {
    fn placeholder(position: usize) -> Self {
        Self {
            match_id: None,
            position,
            team1: BracketSlot::Tbd,
            team2: BracketSlot::Tbd,
            score: None,
            winner: None,
            status: MatchStatus::Pending,
            scheduled_date: None,
        }
    }

    pub fn slot(&self, side: Side) -> BracketSlot {
        match side {
            Side::Team1 => self.team1,
            Side::Team2 => self.team2,
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut BracketSlot {
        match side {
            Side::Team1 => &mut self.team1,
            Side::Team2 => &mut self.team2,
        }
    }

    /// Both teams, once both are known
    pub fn teams(&self) -> Option<(TeamId, TeamId)> {
        Some((self.team1.team()?, self.team2.team()?))
    }

    fn involves(&self, team_id: TeamId) -> bool {
        self.team1.team() == Some(team_id) || self.team2.team() == Some(team_id)
    }
}

/// One layer of the bracket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketRound {
    /// 1-based round number
    pub round: u32,
    pub name: String,
    pub matches: Vec<BracketMatch>,
    /// Teams advanced out of this round without playing
    pub byes: Vec<TeamId>,
}

/// What an accepted result did to the bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advancement {
    /// The winner now occupies a slot in the next round
    Advanced {
        round: u32,
        position: usize,
        side: Side,
    },
    /// The final was decided
    Champion(TeamId),
    /// The same result had already been applied
    AlreadyApplied,
}

/// Where a result at a given position propagates to
enum Target {
    Slot {
        round_idx: usize,
        position: usize,
        side: Side,
    },
    Champion,
}

/// Elimination bracket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub format: TournamentFormat,
    pub total_rounds: u32,
    pub rounds: Vec<BracketRound>,
    pub champion: Option<TeamId>,
}

/// Name of a round from its distance to the final
pub fn round_name(round: u32, total_rounds: u32) -> String {
    match total_rounds - round {
        0 => "Final".to_string(),
        1 => "Semi-Finals".to_string(),
        2 => "Quarter-Finals".to_string(),
        remaining => format!("Round of {}", 1u64 << (remaining + 1)),
    }
}

impl Bracket {
    /// Build the bracket for the admitted teams, in admission order.
    ///
    /// Round-1 matches are linked to an existing round-1 match between the
    /// same two teams when `existing` has one.
    ///
    /// # Errors
    ///
    /// * `TournamentError::BracketNotSupported` - Round-robin format
    /// * `TournamentError::InsufficientTeams` - Fewer than two teams
    pub fn generate(
        format: TournamentFormat,
        teams: &[TeamId],
        existing: &[Match],
    ) -> TournamentResult<Self> {
        if !format.is_elimination() {
            return Err(TournamentError::BracketNotSupported(format));
        }

        let n = teams.len();
        if n < 2 {
            return Err(TournamentError::InsufficientTeams {
                needed: 2,
                current: n,
            });
        }

        let capacity = n.next_power_of_two();
        let total_rounds = capacity.trailing_zeros();
        let bye_count = capacity - n;
        let (bye_teams, playing) = teams.split_at(bye_count);

        let first_round = playing
            .chunks_exact(2)
            .enumerate()
            .map(|(k, pair)| {
                let mut bm = BracketMatch::placeholder(bye_count + k);
                bm.team1 = BracketSlot::Team(pair[0]);
                bm.team2 = BracketSlot::Team(pair[1]);
                if let Some(m) = existing
                    .iter()
                    .find(|m| m.round == 1 && m.pairs(pair[0], pair[1]))
                {
                    // Keep the persisted orientation so scores line up.
                    bm.team1 = BracketSlot::Team(m.team1.team_id);
                    bm.team2 = BracketSlot::Team(m.team2.team_id);
                    bm.match_id = Some(m.id);
                    bm.scheduled_date = Some(m.scheduled_date);
                }
                bm
            })
            .collect();

        let mut rounds = vec![BracketRound {
            round: 1,
            name: round_name(1, total_rounds),
            matches: first_round,
            byes: bye_teams.to_vec(),
        }];

        for round in 2..=total_rounds {
            let count = capacity >> round;
            rounds.push(BracketRound {
                round,
                name: round_name(round, total_rounds),
                matches: (0..count).map(BracketMatch::placeholder).collect(),
                byes: Vec::new(),
            });
        }

        // Byes exist only when capacity > n >= 2, so there is a round 2.
        for (position, &team_id) in bye_teams.iter().enumerate() {
            if let Some(next) = rounds[1].matches.get_mut(position / 2) {
                *next.slot_mut(Side::for_position(position)) = BracketSlot::Team(team_id);
            }
        }

        Ok(Self {
            format,
            total_rounds,
            rounds,
            champion: None,
        })
    }

    /// Number of team slots in round 1, `2^total_rounds`
    pub fn capacity(&self) -> usize {
        1 << self.total_rounds
    }

    /// Teams that skipped round 1
    pub fn byes(&self) -> &[TeamId] {
        self.rounds.first().map_or(&[], |r| r.byes.as_slice())
    }

    /// The bracket match at `position` of a 1-based `round`
    pub fn match_at(&self, round: u32, position: usize) -> Option<&BracketMatch> {
        let round_idx = (round as usize).checked_sub(1)?;
        self.rounds
            .get(round_idx)?
            .matches
            .iter()
            .find(|m| m.position == position)
    }

    /// Whether a persisted match is linked into the bracket
    pub fn contains(&self, match_id: MatchId) -> bool {
        self.locate(match_id).is_some()
    }

    fn locate(&self, match_id: MatchId) -> Option<(usize, usize)> {
        self.rounds.iter().enumerate().find_map(|(round_idx, round)| {
            round
                .matches
                .iter()
                .position(|m| m.match_id == Some(match_id))
                .map(|match_idx| (round_idx, match_idx))
        })
    }

    /// Matches with both teams known that have no persisted match yet,
    /// as `(round, position, team1, team2)`
    pub fn ready_matches(&self) -> Vec<(u32, usize, TeamId, TeamId)> {
        self.rounds
            .iter()
            .flat_map(|round| {
                round.matches.iter().filter_map(move |m| {
                    if m.match_id.is_some() || m.status != MatchStatus::Pending {
                        return None;
                    }
                    let (team1, team2) = m.teams()?;
                    Some((round.round, m.position, team1, team2))
                })
            })
            .collect()
    }

    /// Attach a persisted match to a bracket position.
    ///
    /// # Errors
    ///
    /// * `TournamentError::CorruptRecord` - No such position
    pub fn link_match(
        &mut self,
        round: u32,
        position: usize,
        match_id: MatchId,
        scheduled_date: DateTime<Utc>,
    ) -> TournamentResult<()> {
        let bm = (round as usize)
            .checked_sub(1)
            .and_then(|round_idx| self.rounds.get_mut(round_idx))
            .and_then(|r| r.matches.iter_mut().find(|m| m.position == position))
            .ok_or_else(|| {
                TournamentError::CorruptRecord(format!(
                    "bracket has no round {round} position {position}"
                ))
            })?;

        bm.match_id = Some(match_id);
        bm.scheduled_date = Some(scheduled_date);
        Ok(())
    }

    /// Mirror a provisional score onto the linked bracket match.
    /// Returns whether the match is in the bracket.
    pub fn record_live_score(&mut self, match_id: MatchId, scores: (u32, u32)) -> bool {
        let Some((round_idx, match_idx)) = self.locate(match_id) else {
            return false;
        };
        let bm = &mut self.rounds[round_idx].matches[match_idx];
        bm.score = Some(scores);
        bm.status = MatchStatus::Ongoing;
        true
    }

    /// Record a result and move the winner into the next round.
    ///
    /// Re-applying the result already stored is a no-op. A slot in the next
    /// round that already holds a different team is never overwritten.
    ///
    /// # Errors
    ///
    /// * `TournamentError::NotInBracket` - Match is not linked into the bracket
    /// * `TournamentError::WinnerNotInMatch` - Winner is not one of the two teams
    /// * `TournamentError::ResultAlreadyRecorded` - Match already has a different result
    /// * `TournamentError::SlotConflict` - Next-round slot holds another team
    pub fn advance(
        &mut self,
        match_id: MatchId,
        winner: TeamId,
        scores: (u32, u32),
    ) -> TournamentResult<Advancement> {
        let (round_idx, match_idx) = self
            .locate(match_id)
            .ok_or(TournamentError::NotInBracket(match_id))?;

        let current = &self.rounds[round_idx].matches[match_idx];
        if !current.involves(winner) {
            return Err(TournamentError::WinnerNotInMatch { team_id: winner });
        }

        let replay = current.status == MatchStatus::Completed;
        if replay && (current.winner != Some(winner) || current.score != Some(scores)) {
            return Err(TournamentError::ResultAlreadyRecorded(match_id));
        }

        let position = current.position;
        let target = self.target(round_idx, position);

        // Check the destination before touching anything.
        let already_there = match target {
            Target::Slot {
                round_idx: next_idx,
                position: next_pos,
                side,
            } => {
                let next = self.rounds[next_idx]
                    .matches
                    .iter()
                    .find(|m| m.position == next_pos)
                    .ok_or_else(|| {
                        TournamentError::CorruptRecord(format!(
                            "bracket has no round {} position {next_pos}",
                            next_idx + 1
                        ))
                    })?;
                match next.slot(side) {
                    BracketSlot::Team(occupant) if occupant == winner => true,
                    BracketSlot::Team(occupant) => {
                        return Err(TournamentError::SlotConflict {
                            round: next_idx as u32 + 1,
                            position: next_pos,
                            occupant,
                        });
                    }
                    BracketSlot::Tbd => false,
                }
            }
            Target::Champion => match self.champion {
                Some(champion) if champion == winner => true,
                Some(occupant) => {
                    return Err(TournamentError::SlotConflict {
                        round: self.total_rounds,
                        position: 0,
                        occupant,
                    });
                }
                None => false,
            },
        };

        let current = &mut self.rounds[round_idx].matches[match_idx];
        current.score = Some(scores);
        current.winner = Some(winner);
        current.status = MatchStatus::Completed;

        if already_there {
            return Ok(Advancement::AlreadyApplied);
        }

        match target {
            Target::Slot {
                round_idx: next_idx,
                position: next_pos,
                side,
            } => {
                if let Some(next) = self.rounds[next_idx]
                    .matches
                    .iter_mut()
                    .find(|m| m.position == next_pos)
                {
                    *next.slot_mut(side) = BracketSlot::Team(winner);
                }
                log::debug!(
                    "Team {} advances to round {} position {} ({:?})",
                    winner,
                    next_idx + 1,
                    next_pos,
                    side
                );
                Ok(Advancement::Advanced {
                    round: next_idx as u32 + 1,
                    position: next_pos,
                    side,
                })
            }
            Target::Champion => {
                self.champion = Some(winner);
                Ok(Advancement::Champion(winner))
            }
        }
    }

    fn target(&self, round_idx: usize, position: usize) -> Target {
        if round_idx + 1 >= self.rounds.len() {
            Target::Champion
        } else {
            Target::Slot {
                round_idx: round_idx + 1,
                position: position / 2,
                side: Side::for_position(position),
            }
        }
    }
}
