//! VoltageEMS Reload Coordination
//!
//! Restarts a managed process over its management connection and waits until
//! it is usable again.
//!
//! # Key Components
//!
//! - **OperationBuilder**: validates options against the topology mode and
//!   builds the reload document
//! - **ReloadCoordinator**: dispatches the reload once and drives a
//!   convergence strategy (reconnect for remote, lifecycle polling for
//!   embedded)
//! - **ConnectionHandle**: the management connection the coordinators use
//! - **ReloadCommand**: single entry point tying the above together

pub mod builder;

pub mod command;

pub mod config;

pub mod connection;

pub mod coordinator;

pub mod document;

pub mod error;

pub mod memory_impl;

pub mod options;

// Re-exports
pub use builder::OperationBuilder;
pub use command::{Deployment, ReloadCommand};
pub use config::{timeouts, ReloadSettings};
pub use connection::ConnectionHandle;
pub use coordinator::{
    ConvergedState, Convergence, ConvergenceStrategy, EmbeddedReloadCoordinator, PollStrategy,
    ReconnectStrategy, ReloadCoordinator, ReloadOutcome, ReloadReport, RemoteReloadCoordinator,
};
pub use document::{LifecycleState, ManagementResponse, OperationDocument, PathAddress};
pub use error::{
    ConnectionError, ErrorCategory, ReloadError, Result, TransportError, ValidationError,
};
pub use options::{OptionSet, ReloadOption, TopologyMode};

pub use memory_impl::{MemoryConnection, MemoryStats, ReconnectBehavior, ReloadReply, StateRead};
