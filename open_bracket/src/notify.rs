//! Outbound tournament events.
//!
//! The manager emits an event after each successful save. Sinks are
//! best-effort: a failing sink is logged and the operation still succeeds.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::tournament::{TeamId, TournamentId};

/// Something other parts of the system may want to hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TournamentEvent {
    BracketGenerated {
        tournament_id: TournamentId,
        total_rounds: u32,
    },
    TournamentStarted {
        tournament_id: TournamentId,
    },
    TournamentCompleted {
        tournament_id: TournamentId,
        /// Team ranked first, if any standings exist
        leader: Option<TeamId>,
    },
    TournamentCancelled {
        tournament_id: TournamentId,
    },
    TeamApproved {
        tournament_id: TournamentId,
        team_id: TeamId,
    },
    TeamRejected {
        tournament_id: TournamentId,
        team_id: TeamId,
    },
}

impl TournamentEvent {
    pub fn tournament_id(&self) -> TournamentId {
        match self {
            Self::BracketGenerated { tournament_id, .. }
            | Self::TournamentStarted { tournament_id }
            | Self::TournamentCompleted { tournament_id, .. }
            | Self::TournamentCancelled { tournament_id }
            | Self::TeamApproved { tournament_id, .. }
            | Self::TeamRejected { tournament_id, .. } => *tournament_id,
        }
    }
}

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel is closed")]
    ChannelClosed,

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Destination for tournament events
#[async_trait]
pub trait TournamentNotifier: Send + Sync {
    async fn notify(&self, event: &TournamentEvent) -> Result<(), NotifyError>;
}

/// Writes every event to the log as JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl TournamentNotifier for LogNotifier {
    async fn notify(&self, event: &TournamentEvent) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_string(event).map_err(|e| NotifyError::Delivery(e.to_string()))?;
        log::info!("Tournament {} event: {}", event.tournament_id(), payload);
        Ok(())
    }
}

/// Forwards events into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<TournamentEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TournamentEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TournamentNotifier for ChannelNotifier {
    async fn notify(&self, event: &TournamentEvent) -> Result<(), NotifyError> {
        self.sender
            .send(event.clone())
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
