//! Embedded reload: poll the lifecycle state until running

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{ConvergedState, Convergence, ConvergenceStrategy, ReloadCoordinator, WaitContext};
use crate::builder::OperationBuilder;
use crate::config::{timeouts, ReloadSettings};
use crate::connection::ConnectionHandle;
use crate::document::LifecycleState;
use crate::error::{ReloadError, Result};

/// Convergence for a co-resident process.
///
/// The local handle never drops on reload, so readiness is read from the
/// `server-state` attribute instead. A process still `starting` when the
/// deadline passes counts as converged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollStrategy;

#[async_trait]
impl ConvergenceStrategy for PollStrategy {
    fn phase(&self) -> &'static str {
        "poll"
    }

    fn tolerates_disconnect(&self) -> bool {
        false
    }

    async fn converge(
        &self,
        connection: &dyn ConnectionHandle,
        wait: &WaitContext<'_>,
    ) -> Result<Convergence> {
        let start = Instant::now();
        let read = OperationBuilder::read_server_state();
        let mut polls = 0u32;

        loop {
            polls += 1;

            // Reads fail or are refused while the process is stopping
            let state = match connection.execute(&read).await {
                Ok(resp) if resp.is_success() => {
                    resp.result_string().map(|s| LifecycleState::parse(&s))
                },
                Ok(resp) => {
                    debug!("server-state read refused: {}", resp.failure_description());
                    None
                },
                Err(e) => {
                    debug!("server-state read failed: {}", e);
                    None
                },
            };

            if let Some(LifecycleState::Running) = state {
                info!("Server running after {} polls", polls);
                return Ok(Convergence {
                    state: ConvergedState::Running,
                    last_state: state,
                    polls,
                });
            }

            let elapsed = start.elapsed();
            if elapsed > wait.budget() {
                if let Some(LifecycleState::Starting) = state {
                    info!(
                        "Server still starting after {}ms, not waiting for startup to finish",
                        elapsed.as_millis()
                    );
                    return Ok(Convergence {
                        state: ConvergedState::StartingAtDeadline,
                        last_state: state,
                        polls,
                    });
                }
                return Err(ReloadError::ReadinessTimeout {
                    elapsed_ms: elapsed.as_millis() as u64,
                    last_state: state,
                });
            }

            wait.pause(timeouts::POLL_INTERVAL, "pausing before reconnecting")
                .await?;
        }
    }
}

impl ReloadCoordinator<PollStrategy> {
    pub fn embedded(settings: ReloadSettings) -> Self {
        Self::new(PollStrategy, settings)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::document::{ManagementResponse, OperationDocument, PathAddress, RELOAD_OPERATION};
    use crate::memory_impl::{MemoryConnection, ReloadReply, StateRead};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn reload() -> OperationDocument {
        OperationDocument::new(PathAddress::root(), RELOAD_OPERATION)
            .with_param("admin-only", true)
    }

    fn acknowledging() -> MemoryConnection {
        MemoryConnection::new()
            .with_reload_reply(ReloadReply::Respond(ManagementResponse::success_empty()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_on_first_poll() {
        let conn = acknowledging().with_fallback_state(StateRead::state("running"));
        let coordinator = ReloadCoordinator::embedded(ReloadSettings::default());

        let report = coordinator.run(&conn, reload()).await.unwrap();

        assert_eq!(report.convergence.state, ConvergedState::Running);
        assert_eq!(report.convergence.polls, 1);
        assert_eq!(conn.stats().state_reads, 1);
        assert_eq!(conn.stats().executed, 2);
        assert_eq!(conn.stats().reconnect_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_reads_are_retried() {
        let conn = acknowledging().with_state_reads([
            StateRead::invalid_state(),
            StateRead::Rejected("WFLYCTL0379: System boot is in process".to_string()),
            StateRead::state("stopping"),
            StateRead::state("starting"),
            StateRead::state("running"),
        ]);
        let coordinator = ReloadCoordinator::embedded(ReloadSettings::default());

        let report = coordinator.run(&conn, reload()).await.unwrap();

        assert_eq!(report.convergence.state, ConvergedState::Running);
        assert_eq!(report.convergence.polls, 5);
        assert!(report.elapsed >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_at_deadline_is_success() {
        let conn = acknowledging().with_fallback_state(StateRead::state("starting"));
        let coordinator = ReloadCoordinator::embedded(ReloadSettings::new(100));

        let report = coordinator.run(&conn, reload()).await.unwrap();

        assert_eq!(report.convergence.state, ConvergedState::StartingAtDeadline);
        assert_eq!(
            report.convergence.last_state,
            Some(LifecycleState::Starting)
        );
        assert!(report.elapsed > Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_state_at_deadline_times_out() {
        let conn = acknowledging().with_fallback_state(StateRead::state("stopping"));
        let coordinator = ReloadCoordinator::embedded(ReloadSettings::new(100));

        let err = coordinator.run(&conn, reload()).await.unwrap_err();

        match err {
            ReloadError::ReadinessTimeout {
                elapsed_ms,
                last_state,
            } => {
                assert!(elapsed_ms > 1100);
                assert_eq!(
                    last_state,
                    Some(LifecycleState::Other("stopping".to_string()))
                );
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_at_deadline_times_out() {
        let conn = acknowledging()
            .with_state_reads([StateRead::state("starting")])
            .with_fallback_state(StateRead::invalid_state());
        let coordinator = ReloadCoordinator::embedded(ReloadSettings::new(0));

        let err = coordinator.run(&conn, reload()).await.unwrap_err();

        assert!(matches!(
            err,
            ReloadError::ReadinessTimeout {
                last_state: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_on_dispatch_is_fatal() {
        let conn = MemoryConnection::new().with_reload_reply(ReloadReply::Drop {
            still_connected: false,
        });
        let coordinator = ReloadCoordinator::embedded(ReloadSettings::default());

        let err = coordinator.run(&conn, reload()).await.unwrap_err();

        assert_eq!(err.error_code(), "DISPATCH_TRANSPORT_ERROR");
        assert_eq!(conn.stats().closes, 1);
        assert_eq!(conn.stats().state_reads, 0);
    }

    #[tokio::test]
    async fn test_rejected_reload_does_not_poll() {
        let conn = MemoryConnection::new().with_reload_reply(ReloadReply::Respond(
            ManagementResponse::failed("WFLYCTL0098: Operation reload is already in progress"),
        ));
        let coordinator = ReloadCoordinator::embedded(ReloadSettings::default());

        let err = coordinator.run(&conn, reload()).await.unwrap_err();

        assert!(matches!(err, ReloadError::DispatchRejected(_)));
        assert_eq!(
            err.to_string(),
            "WFLYCTL0098: Operation reload is already in progress"
        );
        assert_eq!(conn.stats().state_reads, 0);
        assert_eq!(conn.stats().closes, 0);
        assert!(conn.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_poll_is_interruption() {
        let conn = acknowledging().with_fallback_state(StateRead::state("stopping"));
        let cancel = CancellationToken::new();
        let coordinator =
            ReloadCoordinator::embedded(ReloadSettings::default()).with_cancellation(cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            trigger.cancel();
        });

        let err = coordinator.run(&conn, reload()).await.unwrap_err();

        assert!(matches!(err, ReloadError::Interrupted(_)));
        assert!(conn.stats().state_reads >= 2);
    }
}
