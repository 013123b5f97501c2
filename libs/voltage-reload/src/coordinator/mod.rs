//! Reload coordination
//!
//! Every reload runs the same state machine:
//!
//! ```text
//! Dispatching ──► AwaitingReconnect | Polling ──► Converged | TimedOut | Failed
//! ```
//!
//! Dispatch and the classification of its result happen once, here. What
//! "back to a usable state" means, and how to wait for it, is supplied by a
//! [`ConvergenceStrategy`]: [`ReconnectStrategy`] for a remote process,
//! [`PollStrategy`] for an embedded one.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ReloadSettings;
use crate::connection::ConnectionHandle;
use crate::document::{LifecycleState, ManagementResponse, OperationDocument};
use crate::error::{ReloadError, Result, TransportError};

pub mod embedded;
pub mod remote;

pub use embedded::PollStrategy;
pub use remote::ReconnectStrategy;

/// Coordinator for a separately running process reached over a connection
pub type RemoteReloadCoordinator = ReloadCoordinator<ReconnectStrategy>;

/// Coordinator for a co-resident process
pub type EmbeddedReloadCoordinator = ReloadCoordinator<PollStrategy>;

// ============================================================================
// Dispatch classification
// ============================================================================

/// Classification of the result of sending the reload operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The process acknowledged the request
    Success,
    /// The connection dropped; the restart is presumed in progress
    TransientDisconnect,
    HardFailure(HardFailure),
}

/// Why a dispatch cannot lead to convergence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardFailure {
    /// Failure response from a live process
    Rejected(String),
    /// Genuine transport fault
    Transport(TransportError),
}

impl HardFailure {
    fn into_error(self, operation: &str) -> ReloadError {
        match self {
            HardFailure::Rejected(description) => ReloadError::DispatchRejected(description),
            HardFailure::Transport(source) => ReloadError::DispatchTransport {
                operation: operation.to_string(),
                source,
            },
        }
    }
}

impl fmt::Display for HardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardFailure::Rejected(description) => write!(f, "rejected: {}", description),
            HardFailure::Transport(err) => write!(f, "transport fault: {}", err),
        }
    }
}

/// Classify the result of dispatching the reload.
///
/// A transport failure is ambiguous: the restart itself severs the
/// connection. When `tolerates_disconnect` is set, a handle that no longer
/// reports itself connected means the restart is under way; one that is still
/// connected had a genuine fault. `is_connected` is only consulted on
/// transport failures.
pub fn classify_dispatch(
    result: std::result::Result<ManagementResponse, TransportError>,
    tolerates_disconnect: bool,
    is_connected: impl FnOnce() -> bool,
) -> ReloadOutcome {
    match result {
        Ok(response) if response.is_success() => ReloadOutcome::Success,
        Ok(response) => {
            ReloadOutcome::HardFailure(HardFailure::Rejected(response.failure_description()))
        },
        Err(err) if tolerates_disconnect && !is_connected() => {
            debug!("Transport failure on a disconnected handle: {}", err);
            ReloadOutcome::TransientDisconnect
        },
        Err(err) => ReloadOutcome::HardFailure(HardFailure::Transport(err)),
    }
}

// ============================================================================
// Waiting
// ============================================================================

/// Deadline and cancellation shared by a strategy's waits
pub struct WaitContext<'a> {
    budget: Duration,
    cancel: &'a CancellationToken,
}

impl<'a> WaitContext<'a> {
    pub fn new(budget: Duration, cancel: &'a CancellationToken) -> Self {
        Self { budget, cancel }
    }

    /// Connection timeout plus the fixed margin
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Sleep for `duration`; cancellation is reported as interruption
    pub async fn pause(&self, duration: Duration, during: &'static str) -> Result<()> {
        self.interruptible(tokio::time::sleep(duration), during).await
    }

    /// Await `fut` unless the invocation is cancelled first
    pub async fn interruptible<F>(&self, fut: F, during: &'static str) -> Result<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Cancelled while {}", during);
                Err(ReloadError::Interrupted(during))
            },
            output = fut => Ok(output),
        }
    }
}

// ============================================================================
// Convergence
// ============================================================================

/// Terminal success states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergedState {
    /// The management connection is usable again
    Reconnected,
    /// The process reported `running`
    Running,
    /// Deadline passed while the process reported `starting`.
    ///
    /// Accepted as success so embedded reloads return at roughly the point a
    /// remote reload would, which is when connectivity is back rather than
    /// when startup has finished.
    StartingAtDeadline,
}

/// Result of the wait phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    pub state: ConvergedState,
    pub last_state: Option<LifecycleState>,
    pub polls: u32,
}

impl Convergence {
    pub fn reconnected() -> Self {
        Self {
            state: ConvergedState::Reconnected,
            last_state: None,
            polls: 0,
        }
    }
}

/// Wait phase entered after the reload is dispatched
#[async_trait]
pub trait ConvergenceStrategy: Send + Sync {
    /// Phase name for logs
    fn phase(&self) -> &'static str;

    /// Whether a transport failure at dispatch may be the restart itself
    fn tolerates_disconnect(&self) -> bool;

    async fn converge(
        &self,
        connection: &dyn ConnectionHandle,
        wait: &WaitContext<'_>,
    ) -> Result<Convergence>;
}

/// Summary of a completed reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    /// Command-line form of the dispatched operation
    pub operation: String,
    /// Dispatch classification (`Success` or `TransientDisconnect`)
    pub dispatch: ReloadOutcome,
    pub convergence: Convergence,
    pub elapsed: Duration,
}

// ============================================================================
// Coordinator
// ============================================================================

/// Dispatches one reload and drives its strategy to a terminal state
pub struct ReloadCoordinator<S> {
    strategy: S,
    settings: ReloadSettings,
    cancel: CancellationToken,
}

impl<S: ConvergenceStrategy> ReloadCoordinator<S> {
    pub fn new(strategy: S, settings: ReloadSettings) -> Self {
        Self {
            strategy,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Interrupt waits when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &ReloadSettings {
        &self.settings
    }

    /// Send `document` exactly once, then wait for the process to converge
    pub async fn run(
        &self,
        connection: &dyn ConnectionHandle,
        document: OperationDocument,
    ) -> Result<ReloadReport> {
        let started = Instant::now();
        let operation = document.to_string();
        info!("Dispatching {}", operation);

        let result = connection.execute(&document).await;
        let dispatch = classify_dispatch(result, self.strategy.tolerates_disconnect(), || {
            connection.is_connected()
        });

        match &dispatch {
            ReloadOutcome::Success => debug!("{} acknowledged", operation),
            ReloadOutcome::TransientDisconnect => {
                info!("Connection dropped by {}, reload presumed in progress", operation)
            },
            ReloadOutcome::HardFailure(failure) => {
                debug!("{} hard failure: {}", operation, failure);
                if let HardFailure::Transport(_) = failure {
                    connection.close().await;
                }
                let err = failure.clone().into_error(&document.operation);
                err.log(&operation);
                return Err(err);
            },
        }

        let wait = WaitContext::new(self.settings.convergence_budget(), &self.cancel);
        debug!(
            "Entering {} phase, budget {}ms",
            self.strategy.phase(),
            wait.budget().as_millis()
        );

        let convergence = match self.strategy.converge(connection, &wait).await {
            Ok(c) => c,
            Err(e) => {
                e.log("Reload did not converge");
                return Err(e);
            },
        };

        let elapsed = started.elapsed();
        info!(
            "Reload converged ({:?}) in {}ms",
            convergence.state,
            elapsed.as_millis()
        );

        Ok(ReloadReport {
            operation,
            dispatch,
            convergence,
            elapsed,
        })
    }
}
