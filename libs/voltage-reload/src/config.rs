//! Reload settings
//!
//! The only tunable is the connection timeout supplied by the caller's
//! runtime context. The convergence budget adds a fixed margin to it.

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ReloadError, Result};

/// Environment variable prefix, e.g. `VOLTAGE_RELOAD_CONNECTION_TIMEOUT_MS`
pub const ENV_PREFIX: &str = "VOLTAGE_RELOAD_";

pub mod timeouts {
    use std::time::Duration;

    /// Default connection timeout in milliseconds
    pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5000;

    /// Pause between dispatch and the first reconnect attempt.
    ///
    /// The listener stalls new connections for several seconds right after a
    /// restart; reconnecting after this short pause avoids the stall.
    pub const RECONNECT_DELAY_MS: u64 = 500;
    pub const RECONNECT_DELAY: Duration = Duration::from_millis(RECONNECT_DELAY_MS);

    /// Added to the connection timeout for the reconnect and readiness budget
    pub const TIMEOUT_MARGIN_MS: u64 = 1000;
    pub const TIMEOUT_MARGIN: Duration = Duration::from_millis(TIMEOUT_MARGIN_MS);

    /// Interval between lifecycle reads of an embedded process
    pub const POLL_INTERVAL_MS: u64 = 50;
    pub const POLL_INTERVAL: Duration = Duration::from_millis(POLL_INTERVAL_MS);
}

/// Settings consumed by the coordinators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadSettings {
    /// Connection timeout of the management client in milliseconds
    pub connection_timeout_ms: u64,
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self {
            connection_timeout_ms: timeouts::DEFAULT_CONNECTION_TIMEOUT_MS,
        }
    }
}

impl ReloadSettings {
    pub fn new(connection_timeout_ms: u64) -> Self {
        Self {
            connection_timeout_ms,
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Time allowed for reconnection or readiness after dispatch
    pub fn convergence_budget(&self) -> Duration {
        self.connection_timeout() + timeouts::TIMEOUT_MARGIN
    }

    /// Load from defaults overridden by `VOLTAGE_RELOAD_*` variables
    pub fn load() -> Result<Self> {
        Ok(Self::figment().extract()?)
    }

    /// Load from a YAML, TOML or JSON file, then environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReloadError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ReloadError::Config("Config file must have an extension".to_string()))?;

        let base = Figment::from(Serialized::defaults(Self::default()));
        let figment = match extension {
            "toml" => base.merge(Toml::file(path)),
            "yaml" | "yml" => base.merge(Yaml::file(path)),
            "json" => base.merge(Json::file(path)),
            _ => {
                return Err(ReloadError::Config(format!(
                    "Unsupported config file format: {}",
                    extension
                )))
            },
        };

        Ok(figment.merge(Env::prefixed(ENV_PREFIX)).extract()?)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed(ENV_PREFIX))
    }
}
