//! Background recalculation worker
//!
//! Mutations call [`RecalcWorker::trigger`] and move on. Triggers land in a
//! single-slot queue drained by one task, so jobs never overlap and any
//! burst of triggers that arrives while a job is already queued collapses
//! into that job. A trigger that arrives while a job is running queues
//! exactly one follow-up run, so the last mutation is always covered.

use super::recalc::Recalculator;
use crate::layout::LayoutReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// What happened to a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new job was queued
    Queued,
    /// A job was already queued and will cover this trigger
    Coalesced,
    /// The worker has shut down
    Stopped,
}

/// Worker progress, published after every state change
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecalcStatus {
    pub running: bool,
    pub completed: u64,
    pub failed: u64,
    pub coalesced: u64,
    pub last_report: Option<LayoutReport>,
    pub last_error: Option<String>,
    pub last_finished: Option<DateTime<Utc>>,
}

impl RecalcStatus {
    /// Jobs that ran to an outcome, successful or not
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }
}

/// Handle to the recalculation task
pub struct RecalcWorker {
    sender: mpsc::Sender<()>,
    status: watch::Receiver<RecalcStatus>,
    coalesced: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl RecalcWorker {
    /// Start the worker on the current tokio runtime
    pub fn spawn(recalculator: Recalculator) -> Self {
        let (sender, mut receiver) = mpsc::channel::<()>(1);
        let (status_tx, status_rx) = watch::channel(RecalcStatus::default());
        let coalesced = Arc::new(AtomicU64::new(0));
        let coalesced_counter = Arc::clone(&coalesced);

        let handle = tokio::spawn(async move {
            while receiver.recv().await.is_some() {
                status_tx.send_modify(|s| s.running = true);
                let result = recalculator.recalculate_positions().await;
                let coalesced = coalesced_counter.load(Ordering::SeqCst);

                status_tx.send_modify(|s| {
                    s.running = false;
                    s.coalesced = coalesced;
                    s.last_finished = Some(Utc::now());
                    match result {
                        Ok(report) => {
                            s.completed += 1;
                            s.last_report = Some(report);
                            s.last_error = None;
                        }
                        Err(e) => {
                            s.failed += 1;
                            s.last_error = Some(e.to_string());
                        }
                    }
                });
            }
            debug!("Recalculation worker stopped");
        });

        info!("Recalculation worker started");
        Self {
            sender,
            status: status_rx,
            coalesced,
            handle,
        }
    }

    /// Request a recalculation without waiting for it
    pub fn trigger(&self) -> TriggerOutcome {
        match self.sender.try_send(()) {
            Ok(()) => {
                debug!("Recalculation queued");
                TriggerOutcome::Queued
            }
            Err(TrySendError::Full(())) => {
                self.coalesced.fetch_add(1, Ordering::SeqCst);
                debug!("Recalculation already queued, trigger coalesced");
                TriggerOutcome::Coalesced
            }
            Err(TrySendError::Closed(())) => TriggerOutcome::Stopped,
        }
    }

    /// Current status snapshot
    pub fn status(&self) -> RecalcStatus {
        let mut status = self.status.borrow().clone();
        status.coalesced = self.coalesced.load(Ordering::SeqCst);
        status
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<RecalcStatus> {
        self.status.clone()
    }

    /// Wait until at least `count` jobs have finished
    pub async fn wait_for_finished(&self, count: u64) -> RecalcStatus {
        let mut rx = self.subscribe();
        // Sender only closes when the task exits; fall through to the last value
        let _ = rx.wait_for(|s| s.finished() >= count).await;
        self.status()
    }

    /// Stop accepting triggers, let a queued job finish, and return the final status
    pub async fn shutdown(self) -> RecalcStatus {
        let RecalcWorker {
            sender,
            status,
            coalesced,
            handle,
        } = self;
        drop(sender);
        if let Err(e) = handle.await {
            tracing::error!("Recalculation worker panicked: {}", e);
        }
        let mut final_status = status.borrow().clone();
        final_status.coalesced = coalesced.load(Ordering::SeqCst);
        info!(
            "Recalculation worker shut down after {} jobs",
            final_status.finished()
        );
        final_status
    }
}
