//! Management connection abstraction
//!
//! The transport itself lives outside this crate. Coordinators only see this
//! trait, so a remote client, an embedded in-process client and the in-memory
//! test double are interchangeable.

use async_trait::async_trait;
use std::time::Duration;

use crate::document::{ManagementResponse, OperationDocument};
use crate::error::{ConnectionError, TransportError};

/// Handle to a managed process.
///
/// Used exclusively by one reload invocation at a time; implementations need
/// no internal ordering guarantees beyond `Send + Sync`.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    /// Execute an operation and wait for its response
    async fn execute(
        &self,
        operation: &OperationDocument,
    ) -> Result<ManagementResponse, TransportError>;

    /// Whether the underlying channel is currently open
    fn is_connected(&self) -> bool;

    /// Reconnect if needed, giving up after `timeout`
    async fn ensure_connected(&self, timeout: Duration) -> Result<(), ConnectionError>;

    /// Close the channel
    async fn close(&self);

    /// Drop the caller's controller session after an unrecoverable reconnect.
    ///
    /// Defaults to closing the channel.
    async fn disconnect_controller(&self) {
        self.close().await
    }
}
