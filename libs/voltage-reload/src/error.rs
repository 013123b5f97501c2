//! Reload Error Types
//!
//! Typed errors for option validation, the management connection and the
//! reload coordination loop.

use thiserror::Error;
use tracing::{error, info, warn, Level};

use crate::document::LifecycleState;
use crate::options::{ReloadOption, TopologyMode};

/// Result type for voltage-reload operations
pub type Result<T> = std::result::Result<T, ReloadError>;

// ============================================================================
// Validation
// ============================================================================

/// Invalid mode/option combination or malformed option value.
///
/// Always raised locally, before anything is dispatched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{option} is not allowed in the {mode} mode.")]
    NotAllowedInMode {
        option: ReloadOption,
        mode: TopologyMode,
    },

    #[error("Missing required argument {option}")]
    MissingRequired { option: ReloadOption },

    #[error("{option} is missing value.")]
    MissingValue { option: ReloadOption },

    #[error("Invalid value for {option}: '{value}'")]
    InvalidBoolean { option: ReloadOption, value: String },

    #[error("Unrecognized argument: {0}")]
    UnknownOption(String),
}

impl ValidationError {
    /// The option the error is about, if it names one
    pub fn option(&self) -> Option<ReloadOption> {
        match self {
            Self::NotAllowedInMode { option, .. }
            | Self::MissingRequired { option }
            | Self::MissingValue { option }
            | Self::InvalidBoolean { option, .. } => Some(*option),
            Self::UnknownOption(_) => None,
        }
    }
}

// ============================================================================
// Connection collaborator errors
// ============================================================================

/// Transport-level failure reported by a [`ConnectionHandle`](crate::ConnectionHandle)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// I/O failure on the channel (includes the drop caused by a restart)
    #[error("IO error: {0}")]
    Io(String),

    /// The process refused the request because of its current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The handle has been closed
    #[error("Connection closed")]
    Closed,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

/// Failure to (re-)establish the management connection
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Connection not established within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Connection failed: {endpoint}: {reason}")]
    Failed { endpoint: String, reason: String },
}

impl ConnectionError {
    pub fn failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        ConnectionError::Failed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// ReloadError
// ============================================================================

/// Top-level error of a reload invocation
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The live process answered with a failure outcome
    #[error("{0}")]
    DispatchRejected(String),

    /// Transport fault while the handle still reported itself connected
    #[error("Failed to execute :{operation}: {source}")]
    DispatchTransport {
        operation: String,
        source: TransportError,
    },

    /// Reconnection did not succeed; the controller session has been dropped
    #[error("Failed to reconnect after reload: {0}")]
    Reconnect(#[source] ConnectionError),

    /// Embedded process did not reach the running state in time
    #[error("Failed to establish connection in {elapsed_ms}ms")]
    ReadinessTimeout {
        elapsed_ms: u64,
        last_state: Option<LifecycleState>,
    },

    #[error("Interrupted while {0}.")]
    Interrupted(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<figment::Error> for ReloadError {
    fn from(err: figment::Error) -> Self {
        ReloadError::Config(err.to_string())
    }
}

/// Error category, used for classification in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Dispatch,
    Connection,
    Timeout,
    Cancelled,
    Configuration,
}

impl ReloadError {
    /// Stable error code for logs and command output
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::DispatchRejected(_) => "DISPATCH_REJECTED",
            Self::DispatchTransport { .. } => "DISPATCH_TRANSPORT_ERROR",
            Self::Reconnect(_) => "RECONNECT_FAILED",
            Self::ReadinessTimeout { .. } => "READINESS_TIMEOUT",
            Self::Interrupted(_) => "INTERRUPTED",
            Self::Config(_) => "CONFIGURATION_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::DispatchRejected(_) | Self::DispatchTransport { .. } => ErrorCategory::Dispatch,
            Self::Reconnect(ConnectionError::Timeout { .. }) | Self::ReadinessTimeout { .. } => {
                ErrorCategory::Timeout
            },
            Self::Reconnect(_) => ErrorCategory::Connection,
            Self::Interrupted(_) => ErrorCategory::Cancelled,
            Self::Config(_) => ErrorCategory::Configuration,
        }
    }

    /// Get log level
    pub fn log_level(&self) -> Level {
        match self.category() {
            ErrorCategory::Validation | ErrorCategory::Cancelled => Level::INFO,
            ErrorCategory::Timeout | ErrorCategory::Connection => Level::WARN,
            ErrorCategory::Dispatch | ErrorCategory::Configuration => Level::ERROR,
        }
    }

    /// True when the caller must open a new connection before continuing
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, Self::DispatchTransport { .. } | Self::Reconnect(_))
    }

    /// Emit the error once at its log level
    pub fn log(&self, context: &str) {
        match self.log_level() {
            Level::ERROR => error!(code = self.error_code(), "{}: {}", context, self),
            Level::WARN => warn!(code = self.error_code(), "{}: {}", context, self),
            _ => info!(code = self.error_code(), "{}: {}", context, self),
        }
    }
}
