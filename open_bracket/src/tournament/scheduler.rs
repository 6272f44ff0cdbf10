//! Periodic date-driven status recompute.
//!
//! [`StatusScheduler`] is an actor: it owns its inbox and timer, runs
//! [`TournamentManager::recompute_all_statuses`] on every tick and stops on
//! [`SchedulerMessage::Shutdown`] or when its handle is dropped.

use super::manager::TournamentManager;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Messages accepted by a running [`StatusScheduler`]
#[derive(Debug)]
pub enum SchedulerMessage {
    /// Recompute now and report how many tournaments changed
    RunNow { response: oneshot::Sender<usize> },

    /// Stop the loop
    Shutdown,
}

/// Outcome of one recompute pass, handed to the pass observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub changed: usize,
    pub elapsed: Duration,
    pub failed: bool,
}

/// Recompute actor
pub struct StatusScheduler {
    manager: TournamentManager,
    period: Duration,
    observer: Option<Box<dyn Fn(PassReport) + Send + Sync>>,
}

impl StatusScheduler {
    pub fn new(manager: TournamentManager, period: Duration) -> Self {
        Self {
            manager,
            period,
            observer: None,
        }
    }

    /// Call `observer` after every pass
    pub fn with_observer(mut self, observer: impl Fn(PassReport) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Spawn the loop on the tokio runtime
    pub fn spawn(self) -> SchedulerHandle {
        let (sender, inbox) = mpsc::channel(16);
        let task = tokio::spawn(self.run(inbox));
        SchedulerHandle { sender, task }
    }

    async fn run(self, mut inbox: mpsc::Receiver<SchedulerMessage>) {
        log::info!("Status scheduler starting, period {:?}", self.period);

        // The first tick fires immediately.
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = inbox.recv() => {
                    match message {
                        Some(SchedulerMessage::RunNow { response }) => {
                            let changed = self.pass().await;
                            // The requester may have given up waiting.
                            let _ = response.send(changed);
                        }
                        Some(SchedulerMessage::Shutdown) | None => break,
                    }
                }

                _ = ticker.tick() => {
                    self.pass().await;
                }
            }
        }

        log::info!("Status scheduler stopped");
    }

    async fn pass(&self) -> usize {
        let started = std::time::Instant::now();
        let (changed, failed) = match self.manager.recompute_all_statuses(Utc::now()).await {
            Ok(changed) => (changed, false),
            Err(e) => {
                log::error!("Status recompute pass failed: {}", e);
                (0, true)
            }
        };

        if let Some(observer) = &self.observer {
            observer(PassReport {
                changed,
                elapsed: started.elapsed(),
                failed,
            });
        }
        changed
    }
}

/// Handle to a spawned [`StatusScheduler`]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerMessage>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Trigger a pass now and wait for its result.
    /// Returns `None` if the scheduler has stopped.
    pub async fn run_now(&self) -> Option<usize> {
        let (response, receiver) = oneshot::channel();
        self.sender
            .send(SchedulerMessage::RunNow { response })
            .await
            .ok()?;
        receiver.await.ok()
    }

    /// Stop the scheduler and wait for the loop to exit
    pub async fn shutdown(self) {
        // A closed inbox means the loop is already gone.
        let _ = self.sender.send(SchedulerMessage::Shutdown).await;
        if let Err(e) = self.task.await {
            log::error!("Status scheduler task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryTeamRoster, InMemoryTournamentRepository, TournamentRepository};
    use crate::notify::LogNotifier;
    use crate::tournament::models::{
        Tournament, TournamentConfig, TournamentFormat, TournamentStatus,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn stale_tournament(repository: &InMemoryTournamentRepository) -> i64 {
        let start = Utc::now() - chrono::Duration::hours(1);
        let config = TournamentConfig::new(
            "Night Cup",
            TournamentFormat::RoundRobin,
            4,
            start,
            start + chrono::Duration::days(1),
        );
        // Stored as upcoming although the start date has passed.
        let stale = Tournament::from_config(0, config, start - chrono::Duration::days(3));
        repository.insert(&stale).await.unwrap()
    }

    #[tokio::test]
    async fn test_run_now_refreshes_stale_status() {
        let repository = Arc::new(InMemoryTournamentRepository::new());
        let id = stale_tournament(&repository).await;
        let manager = TournamentManager::new(
            repository.clone(),
            Arc::new(InMemoryTeamRoster::new()),
            Arc::new(LogNotifier),
        );

        let passes = Arc::new(AtomicUsize::new(0));
        let counter = passes.clone();
        let handle = StatusScheduler::new(manager, Duration::from_secs(3600))
            .with_observer(move |report| {
                assert!(!report.failed);
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .spawn();

        assert!(handle.run_now().await.is_some());

        let stored = repository.load(id).await.unwrap().unwrap();
        assert_eq!(stored.status(), TournamentStatus::Ongoing);
        assert!(!stored.manual_override());
        assert!(passes.load(Ordering::SeqCst) >= 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_second_pass_changes_nothing() {
        let repository = Arc::new(InMemoryTournamentRepository::new());
        stale_tournament(&repository).await;
        let manager = TournamentManager::new(
            repository,
            Arc::new(InMemoryTeamRoster::new()),
            Arc::new(LogNotifier),
        );

        let handle = StatusScheduler::new(manager, Duration::from_secs(3600)).spawn();
        handle.run_now().await;
        assert_eq!(handle.run_now().await, Some(0));
        handle.shutdown().await;
    }
}
