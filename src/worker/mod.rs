//! Poll worker: state machine, per-task context and the single-instance
//! supervisor used by the operator commands.
pub mod poll;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collaborator::{Collaborator, CollaboratorError};
use crate::ledger::LedgerError;

pub use poll::{Poller, TickReport};

// ─── Status / state ───────────────────────────────────────────────────────

/// Persisted worker status; survives restarts through the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Offline,
    Online,
}

impl WorkerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
        }
    }

    /// Anything other than `online` reads as offline.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("online") {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-process lifecycle: `Stopped → Starting → Running → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        })
    }
}

/// Last known position of the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Unknown,
    LiveView,
    Resyncing,
    Lost,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::LiveView => "live view",
            Self::Resyncing => "resyncing",
            Self::Lost => "lost",
        })
    }
}

// ─── Config / errors ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub tick_interval: Duration,
    pub error_backoff: Duration,
    /// Consecutive empty ticks before a forced resync.
    pub empty_poll_threshold: u32,
    /// How long a delivered pair stays suppressed.
    pub suppression_window: Duration,
    /// Release the existence entry after a failed relay so the next tick retries.
    pub retry_failed_relays: bool,
    pub ledger_retention: Duration,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    CollaboratorUnavailable(#[from] CollaboratorError),

    #[error("relay failed for {number}/{otp}")]
    RelayFailure { number: String, otp: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("collaborator could not be established: {0}")]
    FatalInit(String),
}

// ─── Shared state ─────────────────────────────────────────────────────────

/// State visible to both the worker task and the command surface.
pub struct WorkerShared {
    state: Mutex<WorkerState>,
    position: Mutex<Position>,
    relayed: AtomicU64,
    resync_requested: AtomicBool,
}

impl Default for WorkerShared {
    fn default() -> Self {
        Self {
            state: Mutex::new(WorkerState::Stopped),
            position: Mutex::new(Position::Unknown),
            relayed: AtomicU64::new(0),
            resync_requested: AtomicBool::new(false),
        }
    }
}

impl WorkerShared {
    pub fn state(&self) -> WorkerState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(WorkerState::Stopped)
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        if let Ok(mut s) = self.state.lock() {
            *s = state;
        }
    }

    pub fn position(&self) -> Position {
        self.position
            .lock()
            .map(|p| *p)
            .unwrap_or(Position::Unknown)
    }

    pub(crate) fn set_position(&self, position: Position) {
        if let Ok(mut p) = self.position.lock() {
            *p = position;
        }
    }

    /// Events relayed by the current (or last) run.
    pub fn relayed(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }

    pub(crate) fn add_relayed(&self, n: u64) {
        self.relayed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn reset_relayed(&self) {
        self.relayed.store(0, Ordering::Relaxed);
    }

    pub fn request_resync(&self) {
        self.resync_requested.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_resync_request(&self) -> bool {
        self.resync_requested.swap(false, Ordering::SeqCst)
    }
}

/// Everything one worker run owns.
pub struct WorkerContext {
    pub collaborator: Box<dyn Collaborator>,
    pub empty_polls: u32,
    pub relayed: u64,
    pub cancel: CancellationToken,
    pub shared: Arc<WorkerShared>,
}

impl WorkerContext {
    pub fn new(
        collaborator: Box<dyn Collaborator>,
        cancel: CancellationToken,
        shared: Arc<WorkerShared>,
    ) -> Self {
        Self {
            collaborator,
            empty_polls: 0,
            relayed: 0,
            cancel,
            shared,
        }
    }
}

/// Result of one worker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub relayed: u64,
    /// The run ended in `Starting` because the collaborator never became ready.
    pub fatal: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relayed={}", self.relayed)?;
        if self.fatal {
            f.write_str(" (fatal init)")?;
        }
        Ok(())
    }
}

// ─── Supervisor ───────────────────────────────────────────────────────────

/// Longer than the run's own collaborator shutdown bound.
const STOP_TIMEOUT: Duration = Duration::from_secs(15);

pub type CollaboratorFactory =
    Box<dyn Fn() -> Result<Box<dyn Collaborator>, CollaboratorError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped(RunSummary),
    NotRunning,
}

struct ActiveRun {
    handle: JoinHandle<RunSummary>,
    cancel: CancellationToken,
}

/// Guarantees at most one worker run.  `start` and `stop` serialize on one
/// async mutex so they never interleave.
pub struct WorkerControl {
    poller: Arc<Poller>,
    factory: CollaboratorFactory,
    shared: Arc<WorkerShared>,
    active: tokio::sync::Mutex<Option<ActiveRun>>,
}

impl WorkerControl {
    pub fn new(poller: Arc<Poller>, factory: CollaboratorFactory) -> Self {
        Self {
            poller,
            factory,
            shared: Arc::new(WorkerShared::default()),
            active: tokio::sync::Mutex::new(None),
        }
    }

    pub fn shared(&self) -> &Arc<WorkerShared> {
        &self.shared
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    pub fn request_resync(&self) {
        self.shared.request_resync();
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    pub async fn start(&self) -> Result<StartOutcome, WorkerError> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|run| !run.handle.is_finished()) {
            info!("Start requested but worker is already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let collaborator = (self.factory)().map_err(|e| WorkerError::FatalInit(e.to_string()))?;
        let cancel = CancellationToken::new();
        self.shared.reset_relayed();
        self.shared.set_state(WorkerState::Starting);

        let ctx = WorkerContext::new(collaborator, cancel.clone(), Arc::clone(&self.shared));
        let handle = tokio::spawn(poll::run(Arc::clone(&self.poller), ctx));
        *active = Some(ActiveRun { handle, cancel });
        info!("Worker task spawned");
        Ok(StartOutcome::Started)
    }

    /// Cancel the active run and wait until it has released the collaborator.
    pub async fn stop(&self) -> StopOutcome {
        let mut active = self.active.lock().await;
        let Some(run) = active.take() else {
            return StopOutcome::NotRunning;
        };
        if run.handle.is_finished() {
            // Ended by itself (fatal init); nothing left to stop.
            return StopOutcome::NotRunning;
        }

        let ActiveRun { mut handle, cancel } = run;
        cancel.cancel();
        let ended = match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("Worker did not stop within {STOP_TIMEOUT:?}, aborting it");
                handle.abort();
                // Dropping the aborted task's context releases the collaborator.
                self.poller.set_status(WorkerStatus::Offline);
                self.shared.set_position(Position::Unknown);
                self.shared.set_state(WorkerState::Stopped);
                return StopOutcome::Stopped(RunSummary {
                    relayed: self.shared.relayed(),
                    fatal: false,
                });
            }
        };
        match ended {
            Ok(summary) => StopOutcome::Stopped(summary),
            Err(e) => {
                warn!("Worker task ended abnormally: {e}");
                self.shared.set_state(WorkerState::Stopped);
                StopOutcome::Stopped(RunSummary {
                    relayed: self.shared.relayed(),
                    fatal: false,
                })
            }
        }
    }
}
