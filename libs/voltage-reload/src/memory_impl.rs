//! In-memory connection implementation
//!
//! A scripted [`ConnectionHandle`] that simulates a managed process going
//! through a reload: the dropped connection, slow or failing reconnection and
//! flaky lifecycle reads. Suitable for tests and dry runs.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::connection::ConnectionHandle;
use crate::document::{
    ManagementResponse, OperationDocument, READ_ATTRIBUTE_OPERATION, RELOAD_OPERATION,
};
use crate::error::{ConnectionError, TransportError};

/// What the process does with the reload request
#[derive(Debug, Clone)]
pub enum ReloadReply {
    /// Answer with a structured response; the connection stays up
    Respond(ManagementResponse),
    /// Fail at transport level, leaving the handle connected or not
    Drop { still_connected: bool },
}

/// How `ensure_connected` behaves
#[derive(Debug, Clone)]
pub enum ReconnectBehavior {
    /// Listener is back after `after`; slower than the timeout means timeout
    Succeed { after: Duration },
    Fail(ConnectionError),
}

/// One scripted answer to a `server-state` read
#[derive(Debug, Clone)]
pub enum StateRead {
    State(String),
    Transport(TransportError),
    Rejected(String),
}

impl StateRead {
    pub fn state(value: impl Into<String>) -> Self {
        StateRead::State(value.into())
    }

    /// The read raced a stopping process
    pub fn invalid_state() -> Self {
        StateRead::Transport(TransportError::InvalidState("server is stopping".to_string()))
    }
}

/// Calls observed by the connection
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    pub executed: usize,
    pub state_reads: usize,
    pub reconnect_attempts: usize,
    pub closes: usize,
    pub controller_disconnects: usize,
}

struct Inner {
    connected: bool,
    reload_reply: ReloadReply,
    reconnect: ReconnectBehavior,
    state_reads: VecDeque<StateRead>,
    fallback_state: StateRead,
    executed: Vec<OperationDocument>,
    dispatched_at: Option<Instant>,
    reconnects: Vec<(Instant, Duration)>,
    stats: MemoryStats,
}

/// Scripted in-memory managed process
pub struct MemoryConnection {
    inner: Mutex<Inner>,
}

impl MemoryConnection {
    /// Connected process that drops the connection on reload, accepts the
    /// reconnect immediately and reports `running`
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                connected: true,
                reload_reply: ReloadReply::Drop {
                    still_connected: false,
                },
                reconnect: ReconnectBehavior::Succeed {
                    after: Duration::ZERO,
                },
                state_reads: VecDeque::new(),
                fallback_state: StateRead::state("running"),
                executed: Vec::new(),
                dispatched_at: None,
                reconnects: Vec::new(),
                stats: MemoryStats::default(),
            }),
        }
    }

    pub fn with_reload_reply(self, reply: ReloadReply) -> Self {
        self.inner.lock().reload_reply = reply;
        self
    }

    pub fn with_reconnect(self, behavior: ReconnectBehavior) -> Self {
        self.inner.lock().reconnect = behavior;
        self
    }

    /// Answers for successive `server-state` reads
    pub fn with_state_reads(self, reads: impl IntoIterator<Item = StateRead>) -> Self {
        self.inner.lock().state_reads.extend(reads);
        self
    }

    /// Answer once the scripted reads are exhausted
    pub fn with_fallback_state(self, read: StateRead) -> Self {
        self.inner.lock().fallback_state = read;
        self
    }

    pub fn stats(&self) -> MemoryStats {
        self.inner.lock().stats.clone()
    }

    pub fn executed(&self) -> Vec<OperationDocument> {
        self.inner.lock().executed.clone()
    }

    /// Time between the reload dispatch and the first reconnect attempt
    pub fn reconnect_delay(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        let dispatched = inner.dispatched_at?;
        let (first, _) = inner.reconnects.first()?;
        Some(first.duration_since(dispatched))
    }

    /// Timeouts passed to `ensure_connected`
    pub fn reconnect_timeouts(&self) -> Vec<Duration> {
        self.inner.lock().reconnects.iter().map(|(_, t)| *t).collect()
    }

    fn reply_to(
        inner: &mut Inner,
        operation: &OperationDocument,
    ) -> Result<ManagementResponse, TransportError> {
        match operation.operation.as_str() {
            RELOAD_OPERATION => {
                inner.dispatched_at = Some(Instant::now());
                match inner.reload_reply.clone() {
                    ReloadReply::Respond(response) => Ok(response),
                    ReloadReply::Drop { still_connected } => {
                        inner.connected = still_connected;
                        Err(TransportError::Io(
                            "Channel closed while awaiting response".to_string(),
                        ))
                    },
                }
            },
            READ_ATTRIBUTE_OPERATION => {
                inner.stats.state_reads += 1;
                let read = inner
                    .state_reads
                    .pop_front()
                    .unwrap_or_else(|| inner.fallback_state.clone());
                match read {
                    StateRead::State(state) => Ok(ManagementResponse::success(state)),
                    StateRead::Transport(err) => Err(err),
                    StateRead::Rejected(reason) => Ok(ManagementResponse::failed(reason)),
                }
            },
            other => Ok(ManagementResponse::failed(format!(
                "Operation '{}' is not supported",
                other
            ))),
        }
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionHandle for MemoryConnection {
    async fn execute(
        &self,
        operation: &OperationDocument,
    ) -> Result<ManagementResponse, TransportError> {
        let mut inner = self.inner.lock();
        inner.stats.executed += 1;
        inner.executed.push(operation.clone());
        Self::reply_to(&mut inner, operation)
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    async fn ensure_connected(&self, timeout: Duration) -> Result<(), ConnectionError> {
        let behavior = {
            let mut inner = self.inner.lock();
            inner.stats.reconnect_attempts += 1;
            inner.reconnects.push((Instant::now(), timeout));
            if inner.connected {
                return Ok(());
            }
            inner.reconnect.clone()
        };

        match behavior {
            ReconnectBehavior::Succeed { after } if after <= timeout => {
                tokio::time::sleep(after).await;
                self.inner.lock().connected = true;
                Ok(())
            },
            ReconnectBehavior::Succeed { .. } => {
                tokio::time::sleep(timeout).await;
                Err(ConnectionError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            },
            ReconnectBehavior::Fail(err) => Err(err),
        }
    }

    async fn close(&self) {
        let mut inner = self.inner.lock();
        inner.connected = false;
        inner.stats.closes += 1;
    }

    async fn disconnect_controller(&self) {
        let mut inner = self.inner.lock();
        inner.connected = false;
        inner.stats.controller_disconnects += 1;
    }
}
