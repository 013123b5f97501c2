//! Operation builder
//!
//! Pure construction of the reload document from a topology mode and an
//! option set. Nothing here touches a connection.

use crate::document::{
    OperationDocument, PathAddress, READ_ATTRIBUTE_OPERATION, RELOAD_OPERATION,
    SERVER_STATE_ATTRIBUTE,
};
use crate::error::ValidationError;
use crate::options::{OptionSet, ReloadOption, TopologyMode};

/// Builds reload and lifecycle-read documents
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationBuilder;

impl OperationBuilder {
    /// Build the reload operation for `mode`.
    ///
    /// Options restricted to the other mode are rejected rather than ignored.
    /// In domain mode `--host` is required and becomes the single address
    /// segment.
    pub fn build(
        mode: TopologyMode,
        options: &OptionSet,
    ) -> Result<OperationDocument, ValidationError> {
        for &option in ReloadOption::rejected_in(mode) {
            if options.is_present(option) {
                return Err(ValidationError::NotAllowedInMode { option, mode });
            }
        }

        let mut doc = match mode {
            TopologyMode::Domain => {
                let host = options
                    .value(ReloadOption::Host)
                    .ok_or(ValidationError::MissingRequired {
                        option: ReloadOption::Host,
                    })?;
                let mut doc = OperationDocument::new(PathAddress::host(host), RELOAD_OPERATION);
                copy_boolean(options, &mut doc, ReloadOption::RestartServers)?;
                copy_boolean(options, &mut doc, ReloadOption::UseCurrentDomainConfig)?;
                copy_boolean(options, &mut doc, ReloadOption::UseCurrentHostConfig)?;
                doc
            },
            TopologyMode::Standalone => {
                let mut doc = OperationDocument::new(PathAddress::root(), RELOAD_OPERATION);
                copy_boolean(options, &mut doc, ReloadOption::UseCurrentServerConfig)?;
                doc
            },
        };

        copy_boolean(options, &mut doc, ReloadOption::AdminOnly)?;
        Ok(doc)
    }

    /// `:read-attribute(name=server-state)` against the process root
    pub fn read_server_state() -> OperationDocument {
        OperationDocument::new(PathAddress::root(), READ_ATTRIBUTE_OPERATION)
            .with_param("name", SERVER_STATE_ATTRIBUTE)
    }
}

fn copy_boolean(
    options: &OptionSet,
    doc: &mut OperationDocument,
    option: ReloadOption,
) -> Result<(), ValidationError> {
    if let Some(value) = options.boolean(option)? {
        doc.set_param(option.name(), value);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_domain_reload_document() {
        let options = OptionSet::new()
            .with(ReloadOption::Host, "server-one")
            .with(ReloadOption::RestartServers, "true");

        let doc = OperationBuilder::build(TopologyMode::Domain, &options).unwrap();

        assert_eq!(
            doc.address.segments(),
            &[("host".to_string(), "server-one".to_string())]
        );
        assert_eq!(doc.operation, "reload");
        assert_eq!(doc.params.len(), 1);
        assert_eq!(doc.bool_param("restart-servers"), Some(true));
    }

    #[test]
    fn test_standalone_reload_document() {
        let options = OptionSet::new().with(ReloadOption::AdminOnly, "true");

        let doc = OperationBuilder::build(TopologyMode::Standalone, &options).unwrap();

        assert!(doc.address.is_root());
        assert_eq!(
            doc.to_json(),
            json!({"address": [], "operation": "reload", "admin-only": true})
        );
    }

    #[test]
    fn test_domain_requires_host() {
        let options = OptionSet::new().with(ReloadOption::AdminOnly, "false");
        let err = OperationBuilder::build(TopologyMode::Domain, &options).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequired {
                option: ReloadOption::Host
            }
        );
        assert_eq!(err.to_string(), "Missing required argument --host");
    }

    #[test]
    fn test_domain_host_without_value_is_missing() {
        let options = OptionSet::new().with_flag(ReloadOption::Host);
        let err = OperationBuilder::build(TopologyMode::Domain, &options).unwrap_err();
        assert_eq!(err.option(), Some(ReloadOption::Host));
    }

    #[test]
    fn test_restricted_options_rejected_in_wrong_mode() {
        for option in [
            ReloadOption::Host,
            ReloadOption::RestartServers,
            ReloadOption::UseCurrentDomainConfig,
            ReloadOption::UseCurrentHostConfig,
        ] {
            let options = OptionSet::new().with(option, "true");
            let err = OperationBuilder::build(TopologyMode::Standalone, &options).unwrap_err();
            assert_eq!(
                err,
                ValidationError::NotAllowedInMode {
                    option,
                    mode: TopologyMode::Standalone
                }
            );
        }

        let options = OptionSet::new()
            .with(ReloadOption::Host, "master")
            .with(ReloadOption::UseCurrentServerConfig, "true");
        let err = OperationBuilder::build(TopologyMode::Domain, &options).unwrap_err();
        assert_eq!(
            err.to_string(),
            "--use-current-server-config is not allowed in the domain mode."
        );
    }

    #[test]
    fn test_standalone_reports_host_first() {
        let options = OptionSet::new()
            .with(ReloadOption::RestartServers, "true")
            .with(ReloadOption::Host, "master");
        let err = OperationBuilder::build(TopologyMode::Standalone, &options).unwrap_err();
        assert_eq!(err.option(), Some(ReloadOption::Host));
    }

    #[test]
    fn test_boolean_values() {
        for (literal, expected) in [("TRUE", true), ("false", false), ("True", true)] {
            let options = OptionSet::new().with(ReloadOption::UseCurrentServerConfig, literal);
            let doc = OperationBuilder::build(TopologyMode::Standalone, &options).unwrap();
            assert_eq!(doc.bool_param("use-current-server-config"), Some(expected));
        }

        let options = OptionSet::new().with(ReloadOption::AdminOnly, "maybe");
        let err = OperationBuilder::build(TopologyMode::Standalone, &options).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for --admin-only: 'maybe'");
    }

    #[test]
    fn test_build_is_deterministic() {
        let options = OptionSet::new()
            .with(ReloadOption::Host, "master")
            .with(ReloadOption::UseCurrentHostConfig, "False")
            .with(ReloadOption::AdminOnly, "true");

        let first = OperationBuilder::build(TopologyMode::Domain, &options);
        let second = OperationBuilder::build(TopologyMode::Domain, &options);
        assert_eq!(first, second);

        let bad = OptionSet::new().with(ReloadOption::Host, "master");
        assert_eq!(
            OperationBuilder::build(TopologyMode::Standalone, &bad),
            OperationBuilder::build(TopologyMode::Standalone, &bad)
        );
    }

    #[test]
    fn test_read_server_state() {
        let doc = OperationBuilder::read_server_state();
        assert_eq!(
            doc.to_json(),
            json!({"address": [], "operation": "read-attribute", "name": "server-state"})
        );
    }
}
