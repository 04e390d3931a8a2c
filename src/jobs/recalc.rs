//! Position recalculation job
//!
//! One job reads a snapshot of the graph, loads the previous positions,
//! runs layering and the solver on a blocking thread, then saves the new
//! map. The job is bounded by a wall-clock timeout. A job that overruns is
//! told to stop; the solver polls that flag every iteration, and the caller
//! waits for the blocking thread to wind down before returning, so jobs never
//! overlap. `Timeout` is only returned when nothing was written.

use crate::config::EngineConfig;
use crate::graph::RelationshipPolicy;
use crate::layout::{compute_layout_until, LayoutReport, SolverConfig};
use crate::persistence::{
    DataSource, DirectoryError, FilePositionStore, JsonFileSource, PositionStore, StoreError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Recalculation errors. None of them leave a partially written file.
#[derive(Error, Debug)]
pub enum RecalcError {
    #[error("Failed to read graph data: {0}")]
    Source(#[from] DirectoryError),

    #[error("Failed to persist positions: {0}")]
    Store(#[from] StoreError),

    #[error("Recalculation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Recalculation cancelled before saving")]
    Cancelled,

    #[error("Recalculation task failed: {0}")]
    Task(String),
}

pub type RecalcResult<T> = Result<T, RecalcError>;

/// Runs full recalculations against a data source and a position store
#[derive(Clone)]
pub struct Recalculator {
    source: Arc<dyn DataSource>,
    store: Arc<dyn PositionStore>,
    solver: SolverConfig,
    policy: RelationshipPolicy,
    timeout: Duration,
}

impl Recalculator {
    pub fn new(
        source: Arc<dyn DataSource>,
        store: Arc<dyn PositionStore>,
        solver: SolverConfig,
    ) -> Self {
        Self {
            source,
            store,
            solver,
            policy: RelationshipPolicy::default(),
            timeout: Duration::from_secs(120),
        }
    }

    /// File-backed recalculator for the paths in `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        let source = JsonFileSource::new(&config.data_path, config.policy.clone());
        let store = FilePositionStore::new(&config.positions_path);
        Self::new(Arc::new(source), Arc::new(store), config.solver.clone())
            .with_policy(config.policy.clone())
            .with_timeout(config.recalc_timeout())
    }

    pub fn with_policy(mut self, policy: RelationshipPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn PositionStore> {
        &self.store
    }

    /// Recompute and persist all positions.
    ///
    /// Errors are returned to the caller and logged; they never corrupt the
    /// stored positions.
    pub async fn recalculate_positions(&self) -> RecalcResult<LayoutReport> {
        let job_id = Uuid::new_v4();
        let started = Instant::now();
        info!("Recalculation {} started", job_id);

        let cancel = Arc::new(AtomicBool::new(false));
        let job = Job {
            source: Arc::clone(&self.source),
            store: Arc::clone(&self.store),
            solver: self.solver.clone(),
            policy: self.policy.clone(),
            cancel: Arc::clone(&cancel),
        };
        let mut handle = tokio::task::spawn_blocking(move || job.run());

        let result = match timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RecalcError::Task(e.to_string())),
            Err(_) => {
                cancel.store(true, Ordering::SeqCst);
                match handle.await {
                    Ok(Err(RecalcError::Cancelled)) => Err(RecalcError::Timeout(self.timeout)),
                    Ok(Ok(report)) => {
                        warn!("Recalculation {} saved after its deadline", job_id);
                        Ok(report)
                    }
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(RecalcError::Task(e.to_string())),
                }
            }
        };

        match &result {
            Ok(report) => info!(
                "Recalculation {} finished in {:?}: {} people, {} iterations, converged={}",
                job_id,
                started.elapsed(),
                report.people,
                report.iterations,
                report.converged
            ),
            Err(e) => error!("Recalculation {} failed: {}", job_id, e),
        }
        result
    }

    /// Same as [`Recalculator::recalculate_positions`] on the calling thread,
    /// without a timeout
    pub fn recalculate_blocking(&self) -> RecalcResult<LayoutReport> {
        Job {
            source: Arc::clone(&self.source),
            store: Arc::clone(&self.store),
            solver: self.solver.clone(),
            policy: self.policy.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
        .run()
    }
}

struct Job {
    source: Arc<dyn DataSource>,
    store: Arc<dyn PositionStore>,
    solver: SolverConfig,
    policy: RelationshipPolicy,
    cancel: Arc<AtomicBool>,
}

impl Job {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn run(self) -> RecalcResult<LayoutReport> {
        let graph = self.source.snapshot(&self.policy)?;
        if self.cancelled() {
            return Err(RecalcError::Cancelled);
        }
        let previous = self.store.load_or_cold()?;
        debug!(
            "Laying out {} people from {} previous positions",
            graph.person_count(),
            previous.len()
        );

        let layout = compute_layout_until(&graph, &previous, &self.solver, || self.cancelled())
            .ok_or(RecalcError::Cancelled)?;
        if self.cancelled() {
            return Err(RecalcError::Cancelled);
        }
        self.store.save(&layout.positions)?;
        Ok(layout.report)
    }
}
