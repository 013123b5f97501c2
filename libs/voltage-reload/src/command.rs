//! Reload command entry point
//!
//! Validates the options for the invocation's topology, builds the document
//! and hands it to the coordinator matching the deployment.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::builder::OperationBuilder;
use crate::config::ReloadSettings;
use crate::connection::ConnectionHandle;
use crate::coordinator::{EmbeddedReloadCoordinator, ReloadReport, RemoteReloadCoordinator};
use crate::document::OperationDocument;
use crate::error::{ReloadError, Result};
use crate::options::{OptionSet, TopologyMode};

/// Where the managed process runs relative to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    /// Separate process behind a management connection
    #[default]
    Remote,
    /// Co-resident process behind a local handle
    Embedded,
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deployment::Remote => write!(f, "remote"),
            Deployment::Embedded => write!(f, "embedded"),
        }
    }
}

/// One reload invocation
#[derive(Debug, Clone)]
pub struct ReloadCommand {
    mode: TopologyMode,
    deployment: Deployment,
    settings: ReloadSettings,
    cancel: CancellationToken,
}

impl ReloadCommand {
    pub fn new(mode: TopologyMode, deployment: Deployment, settings: ReloadSettings) -> Self {
        Self {
            mode,
            deployment,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn mode(&self) -> TopologyMode {
        self.mode
    }

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    /// Validate `options` and build the document without sending it
    pub fn build(&self, options: &OptionSet) -> Result<OperationDocument> {
        OperationBuilder::build(self.mode, options).map_err(|e| {
            let err = ReloadError::from(e);
            err.log(&format!("Rejected reload options in {} mode", self.mode));
            err
        })
    }

    /// Build, dispatch and wait for convergence.
    ///
    /// Validation failures return before anything is sent.
    pub async fn execute(
        &self,
        connection: &dyn ConnectionHandle,
        options: &OptionSet,
    ) -> Result<ReloadReport> {
        let document = self.build(options)?;

        match self.deployment {
            Deployment::Remote => {
                RemoteReloadCoordinator::remote(self.settings.clone())
                    .with_cancellation(self.cancel.clone())
                    .run(connection, document)
                    .await
            },
            Deployment::Embedded => {
                EmbeddedReloadCoordinator::embedded(self.settings.clone())
                    .with_cancellation(self.cancel.clone())
                    .run(connection, document)
                    .await
            },
        }
    }
}
