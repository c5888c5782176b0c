// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin configuration.
//!
//! The configuration surface mirrors the options the harness exposes to
//! operators: requirement-marker mandating, CSV report destination, and the
//! auto-debug toggles. Parsed from a TOML document; the auto-debug toggles
//! can additionally be forced on through environment variables.

use crate::errors::ConfigParseError;
use camino::Utf8PathBuf;
use serde::Deserialize;

/// Environment variable that force-enables [`PluginConfig::auto_debug`].
pub const AUTO_DEBUG_ENV: &str = "REQTRACE_AUTO_DEBUG";

/// Environment variable that force-enables
/// [`PluginConfig::auto_debug_wait_for_connect`].
pub const AUTO_DEBUG_WAIT_ENV: &str = "REQTRACE_AUTO_DEBUG_WAIT_FOR_CONNECT";

/// Operator-facing plugin configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PluginConfig {
    /// If true, every collected test must carry valid `requirements` marker
    /// arguments; violations abort the run after collection.
    #[serde(default)]
    pub mandate_requirement_markers: bool,

    /// End-of-run reporting. Absent means no report is written.
    #[serde(default)]
    pub reporting: Option<ReportingConfig>,

    /// If true, engage the interactive-debugging facility on the controller
    /// at session start.
    #[serde(default)]
    auto_debug: bool,

    /// If true, the auto-debug facility waits for a client to connect before
    /// tests start.
    #[serde(default)]
    auto_debug_wait_for_connect: bool,
}

/// Reporting configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReportingConfig {
    /// Destination path for the end-of-run CSV report.
    pub csv_export_path: Utf8PathBuf,

    /// If true, tests that were collected but never executed are omitted
    /// from the report.
    #[serde(default)]
    pub omit_unexecuted_tests: bool,
}

impl PluginConfig {
    /// Parses a configuration from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigParseError> {
        toml::from_str(input).map_err(ConfigParseError::new)
    }

    /// Returns whether auto-debug is enabled, honoring the
    /// `REQTRACE_AUTO_DEBUG` environment override.
    pub fn auto_debug(&self) -> bool {
        self.auto_debug_with_env(|name| std::env::var(name).ok())
    }

    /// Returns whether auto-debug waits for a client connection, honoring
    /// the `REQTRACE_AUTO_DEBUG_WAIT_FOR_CONNECT` environment override.
    pub fn auto_debug_wait_for_connect(&self) -> bool {
        self.auto_debug_wait_with_env(|name| std::env::var(name).ok())
    }

    fn auto_debug_with_env(&self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        self.auto_debug || env_truthy(&lookup, AUTO_DEBUG_ENV)
    }

    fn auto_debug_wait_with_env(&self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        self.auto_debug_wait_for_connect || env_truthy(&lookup, AUTO_DEBUG_WAIT_ENV)
    }
}

fn env_truthy(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    lookup(name).is_some_and(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PluginConfig::from_toml_str("").expect("empty config parses");
        assert!(!config.mandate_requirement_markers);
        assert!(config.reporting.is_none());
        assert!(!config.auto_debug_with_env(|_| None));
        assert!(!config.auto_debug_wait_with_env(|_| None));
    }

    #[test]
    fn full_document_parses() {
        let config = PluginConfig::from_toml_str(indoc! {r#"
            mandate-requirement-markers = true
            auto-debug = true

            [reporting]
            csv-export-path = "target/reports/traceability.csv"
            omit-unexecuted-tests = true
        "#})
        .expect("config parses");

        assert!(config.mandate_requirement_markers);
        assert!(config.auto_debug_with_env(|_| None));
        let reporting = config.reporting.expect("reporting section present");
        assert_eq!(
            reporting.csv_export_path,
            Utf8PathBuf::from("target/reports/traceability.csv")
        );
        assert!(reporting.omit_unexecuted_tests);
    }

    #[test]
    fn reporting_defaults_omit_flag_to_false() {
        let config = PluginConfig::from_toml_str(indoc! {r#"
            [reporting]
            csv-export-path = "report.csv"
        "#})
        .expect("config parses");
        assert!(
            !config
                .reporting
                .expect("reporting section present")
                .omit_unexecuted_tests
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = PluginConfig::from_toml_str("mandate-requirement-marker = true");
        assert!(result.is_err(), "typoed key should be rejected");
    }

    #[test]
    fn env_override_forces_auto_debug_on() {
        let config = PluginConfig::from_toml_str("").expect("empty config parses");
        let env = |name: &str| {
            (name == AUTO_DEBUG_ENV).then(|| "1".to_owned())
        };
        assert!(config.auto_debug_with_env(env));

        // An empty value does not count as set.
        let empty = |name: &str| (name == AUTO_DEBUG_ENV).then(String::new);
        assert!(!config.auto_debug_with_env(empty));
    }
}
