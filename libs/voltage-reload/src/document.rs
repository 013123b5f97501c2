//! Management operation documents and responses
//!
//! Serializes to the management protocol's JSON shape:
//! `{"address":[{"host":"server-one"}],"operation":"reload","restart-servers":true}`

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Operation name of the reload request
pub const RELOAD_OPERATION: &str = "reload";
/// Operation name used to read a single attribute
pub const READ_ATTRIBUTE_OPERATION: &str = "read-attribute";
/// Lifecycle attribute polled while an embedded process restarts
pub const SERVER_STATE_ATTRIBUTE: &str = "server-state";
/// Address segment type of a domain host
pub const HOST_SEGMENT: &str = "host";

// ============================================================================
// Address
// ============================================================================

/// Ordered `(type, name)` segments; empty addresses the whole process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathAddress(Vec<(String, String)>);

impl PathAddress {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn host(name: impl Into<String>) -> Self {
        Self(vec![(HOST_SEGMENT.to_string(), name.into())])
    }

    pub fn segments(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PathAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Segment<'a>(&'a str, &'a str);

        impl Serialize for Segment<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(self.0, self.1)?;
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (kind, name) in &self.0 {
            seq.serialize_element(&Segment(kind, name))?;
        }
        seq.end()
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, name) in &self.0 {
            write!(f, "/{}={}", kind, name)?;
        }
        Ok(())
    }
}

// ============================================================================
// Operation document
// ============================================================================

/// A management operation: target address, operation name and parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDocument {
    pub address: PathAddress,
    pub operation: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl OperationDocument {
    pub fn new(address: PathAddress, operation: impl Into<String>) -> Self {
        Self {
            address,
            operation: operation.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_param(name, value);
        self
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(name.into(), value.into());
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn bool_param(&self, name: &str) -> Option<bool> {
        self.param(name).and_then(Value::as_bool)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Command-line form, e.g. `/host=master:reload(restart-servers=true)`
impl fmt::Display for OperationDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.operation)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|(name, value)| match value {
                    Value::String(s) => format!("{}={}", name, s),
                    other => format!("{}={}", name, other),
                })
                .collect();
            write!(f, "({})", params.join(","))?;
        }
        Ok(())
    }
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
    Cancelled,
}

/// Structured reply of the managed process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementResponse {
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(
        rename = "failure-description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub failure_description: Option<Value>,
}

impl ManagementResponse {
    pub fn success(result: impl Into<Value>) -> Self {
        Self {
            outcome: Outcome::Success,
            result: Some(result.into()),
            failure_description: None,
        }
    }

    pub fn success_empty() -> Self {
        Self {
            outcome: Outcome::Success,
            result: None,
            failure_description: None,
        }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            result: None,
            failure_description: Some(Value::String(description.into())),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Human-readable failure description
    pub fn failure_description(&self) -> String {
        match &self.failure_description {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "Operation failed without a failure description".to_string(),
        }
    }

    pub fn result_string(&self) -> Option<String> {
        match self.result.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

// ============================================================================
// Lifecycle state
// ============================================================================

/// Self-reported lifecycle status of the managed process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    Other(String),
}

impl LifecycleState {
    pub fn parse(value: &str) -> Self {
        match value {
            "running" => LifecycleState::Running,
            "starting" => LifecycleState::Starting,
            other => LifecycleState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Other(s) => s,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_json_shape() {
        let doc = OperationDocument::new(PathAddress::host("server-one"), RELOAD_OPERATION)
            .with_param("restart-servers", true);

        assert_eq!(
            doc.to_json(),
            json!({
                "address": [{"host": "server-one"}],
                "operation": "reload",
                "restart-servers": true
            })
        );

        let root = OperationDocument::new(PathAddress::root(), RELOAD_OPERATION);
        assert_eq!(root.to_json(), json!({"address": [], "operation": "reload"}));
    }

    #[test]
    fn test_document_display() {
        let doc = OperationDocument::new(PathAddress::host("master"), RELOAD_OPERATION)
            .with_param("restart-servers", true)
            .with_param("admin-only", false);
        assert_eq!(
            doc.to_string(),
            "/host=master:reload(admin-only=false,restart-servers=true)"
        );

        let read = OperationDocument::new(PathAddress::root(), READ_ATTRIBUTE_OPERATION)
            .with_param("name", SERVER_STATE_ATTRIBUTE);
        assert_eq!(read.to_string(), ":read-attribute(name=server-state)");
    }

    #[test]
    fn test_response_roundtrip_from_wire() {
        let resp: ManagementResponse = serde_json::from_value(json!({
            "outcome": "failed",
            "failure-description": "WFLYCTL0216: Management resource not found"
        }))
        .unwrap();
        assert!(!resp.is_success());
        assert_eq!(
            resp.failure_description(),
            "WFLYCTL0216: Management resource not found"
        );

        let resp: ManagementResponse =
            serde_json::from_value(json!({"outcome": "success", "result": "running"})).unwrap();
        assert_eq!(resp.result_string().as_deref(), Some("running"));
    }

    #[test]
    fn test_lifecycle_state_parse() {
        assert_eq!(LifecycleState::parse("running"), LifecycleState::Running);
        assert_eq!(LifecycleState::parse("starting"), LifecycleState::Starting);
        assert_eq!(
            LifecycleState::parse("reload-required"),
            LifecycleState::Other("reload-required".to_string())
        );
        assert_eq!(LifecycleState::parse("stopping").as_str(), "stopping");
    }
}
