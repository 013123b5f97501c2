//! Reload options and topology mode
//!
//! Which options a reload accepts depends on the topology of the managed
//! process. Availability is checked against an explicit [`TopologyMode`]
//! so validation never depends on ambient state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Topology of the managed process, fixed for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyMode {
    /// A single standalone server
    #[default]
    Standalone,
    /// One host within a multi-process domain
    Domain,
}

impl fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyMode::Standalone => write!(f, "standalone"),
            TopologyMode::Domain => write!(f, "domain"),
        }
    }
}

/// Options recognized by the reload command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReloadOption {
    AdminOnly,
    UseCurrentServerConfig,
    Host,
    RestartServers,
    UseCurrentDomainConfig,
    UseCurrentHostConfig,
}

impl ReloadOption {
    pub const ALL: [ReloadOption; 6] = [
        ReloadOption::AdminOnly,
        ReloadOption::UseCurrentServerConfig,
        ReloadOption::Host,
        ReloadOption::RestartServers,
        ReloadOption::UseCurrentDomainConfig,
        ReloadOption::UseCurrentHostConfig,
    ];

    /// Parameter name as it appears in the operation document
    pub fn name(self) -> &'static str {
        match self {
            ReloadOption::AdminOnly => "admin-only",
            ReloadOption::UseCurrentServerConfig => "use-current-server-config",
            ReloadOption::Host => "host",
            ReloadOption::RestartServers => "restart-servers",
            ReloadOption::UseCurrentDomainConfig => "use-current-domain-config",
            ReloadOption::UseCurrentHostConfig => "use-current-host-config",
        }
    }

    /// Mode the option is restricted to, `None` if valid in both
    pub fn restricted_to(self) -> Option<TopologyMode> {
        match self {
            ReloadOption::AdminOnly => None,
            ReloadOption::UseCurrentServerConfig => Some(TopologyMode::Standalone),
            ReloadOption::Host
            | ReloadOption::RestartServers
            | ReloadOption::UseCurrentDomainConfig
            | ReloadOption::UseCurrentHostConfig => Some(TopologyMode::Domain),
        }
    }

    pub fn allowed_in(self, mode: TopologyMode) -> bool {
        !matches!(self.restricted_to(), Some(m) if m != mode)
    }

    /// Options that must be absent in `mode`, in the order they are checked
    pub fn rejected_in(mode: TopologyMode) -> &'static [ReloadOption] {
        match mode {
            TopologyMode::Domain => &[ReloadOption::UseCurrentServerConfig],
            TopologyMode::Standalone => &[
                ReloadOption::Host,
                ReloadOption::UseCurrentDomainConfig,
                ReloadOption::UseCurrentHostConfig,
                ReloadOption::RestartServers,
            ],
        }
    }
}

impl fmt::Display for ReloadOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--{}", self.name())
    }
}

impl FromStr for ReloadOption {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("--").unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|o| o.name() == name)
            .ok_or_else(|| ValidationError::UnknownOption(s.to_string()))
    }
}

/// Parse a boolean literal case-insensitively
pub fn parse_bool(option: ReloadOption, value: &str) -> Result<bool, ValidationError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ValidationError::InvalidBoolean {
            option,
            value: value.to_string(),
        })
    }
}

/// Options supplied to one reload invocation.
///
/// A present option maps to its raw value; `None` means the option was given
/// without a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    values: BTreeMap<ReloadOption, Option<String>>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs, names with or without the `--` prefix
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            let option = name.as_ref().parse::<ReloadOption>()?;
            set.values.insert(option, value.map(Into::into));
        }
        Ok(set)
    }

    pub fn with(mut self, option: ReloadOption, value: impl Into<String>) -> Self {
        self.insert(option, Some(value.into()));
        self
    }

    /// Mark an option present without a value
    pub fn with_flag(mut self, option: ReloadOption) -> Self {
        self.insert(option, None);
        self
    }

    pub fn insert(&mut self, option: ReloadOption, value: Option<String>) {
        self.values.insert(option, value);
    }

    pub fn is_present(&self, option: ReloadOption) -> bool {
        self.values.contains_key(&option)
    }

    pub fn value(&self, option: ReloadOption) -> Option<&str> {
        self.values.get(&option).and_then(|v| v.as_deref())
    }

    /// Parsed boolean value; `Ok(None)` when the option is absent
    pub fn boolean(&self, option: ReloadOption) -> Result<Option<bool>, ValidationError> {
        match self.values.get(&option) {
            None => Ok(None),
            Some(None) => Err(ValidationError::MissingValue { option }),
            Some(Some(value)) => parse_bool(option, value).map(Some),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReloadOption, Option<&str>)> {
        self.values.iter().map(|(o, v)| (*o, v.as_deref()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
