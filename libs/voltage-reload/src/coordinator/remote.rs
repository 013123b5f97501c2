//! Remote reload: fixed pause, then one bounded reconnect

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Convergence, ConvergenceStrategy, ReloadCoordinator, WaitContext};
use crate::config::{timeouts, ReloadSettings};
use crate::connection::ConnectionHandle;
use crate::error::{ReloadError, Result};

/// Convergence for a process reached over a management connection.
///
/// Converged as soon as the connection is re-established; startup may still
/// be in progress on the other side.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconnectStrategy;

#[async_trait]
impl ConvergenceStrategy for ReconnectStrategy {
    fn phase(&self) -> &'static str {
        "reconnect"
    }

    fn tolerates_disconnect(&self) -> bool {
        true
    }

    async fn converge(
        &self,
        connection: &dyn ConnectionHandle,
        wait: &WaitContext<'_>,
    ) -> Result<Convergence> {
        wait.pause(timeouts::RECONNECT_DELAY, "pausing before reconnecting")
            .await?;

        debug!("Reconnecting, timeout {}ms", wait.budget().as_millis());
        let reconnected = wait
            .interruptible(
                connection.ensure_connected(wait.budget()),
                "waiting for reconnection",
            )
            .await;

        // Any way out of the reconnect wait other than success leaves the
        // handle unusable
        let err = match reconnected {
            Ok(Ok(())) => {
                info!("Reconnected after reload");
                return Ok(Convergence::reconnected());
            },
            Ok(Err(e)) => ReloadError::Reconnect(e),
            Err(interrupted) => interrupted,
        };

        warn!("Reconnect not completed, dropping controller session");
        connection.disconnect_controller().await;
        Err(err)
    }
}

impl ReloadCoordinator<ReconnectStrategy> {
    pub fn remote(settings: ReloadSettings) -> Self {
        Self::new(ReconnectStrategy, settings)
    }
}
