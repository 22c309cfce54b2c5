//! Configuration consumed from the external loader.
//!
//! File loading and default-merging happen outside the core; this module
//! owns the recognized option set and its validation.

use std::num::NonZeroUsize;

use kestrel_discovery::{PatternError, PatternSet, SpecPattern};
use kestrel_suite::{FilterChain, SuiteError};
use serde::{Deserialize, Serialize};

/// Errors raised while interpreting a configuration.
///
/// Every variant is reported under the `ConfigParseFailure` kind.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The payload handed over by the loader was not valid.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// `parallel` must allow at least one sandbox.
    #[error("'parallel' must be a positive integer")]
    NonPositiveParallel,

    /// A file pattern did not compile.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// A focus filter did not compile.
    #[error(transparent)]
    Filter(#[from] SuiteError),
}

impl ConfigError {
    /// The error-taxonomy kind used on the wire.
    pub fn kind(&self) -> &'static str {
        "ConfigParseFailure"
    }
}

/// A remote runner endpoint, recognized for the external dispatch mode.
///
/// Local execution ignores everything but the name; the transport is a
/// user-supplied collaborator outside the core.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerEndpoint {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
}

/// The recognized configuration options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Test files to include.
    #[serde(default = "default_files")]
    pub files: Vec<String>,
    /// Suppressed paths.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Optional further restriction on included files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suites: Option<Vec<String>>,
    /// Maximum number of concurrent sandboxes.
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    /// Stop on first failure.
    #[serde(default)]
    pub bail: bool,
    /// Default per-test timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Shuffle child order inside every suite.
    #[serde(default)]
    pub randomize: bool,
    /// Seed for the shuffle RNG; drawn at run time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Focus filters, compiled to anchored regexes.
    #[serde(default)]
    pub filter: Vec<String>,
    /// Remote runner endpoints, enabling the external dispatch mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_runners: Option<Vec<RunnerEndpoint>>,
}

fn default_files() -> Vec<String> {
    vec!["**/*.spec.{js,ts}".to_owned(), "**/*.test.{js,ts}".to_owned()]
}

fn default_parallel() -> usize {
    4
}

fn default_timeout() -> u64 {
    5_000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            files: default_files(),
            exclude: Vec::new(),
            suites: None,
            parallel: default_parallel(),
            bail: false,
            timeout: default_timeout(),
            randomize: false,
            seed: None,
            filter: Vec::new(),
            test_runners: None,
        }
    }
}

impl RunnerConfig {
    /// Parses the JSON form produced by the external loader.
    pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks option ranges and compiles every pattern once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parallel()?;
        self.pattern_set()?;
        FilterChain::compile(&self.filter)?;
        Ok(())
    }

    /// The concurrency bound as a checked non-zero value.
    pub fn parallel(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.parallel).ok_or(ConfigError::NonPositiveParallel)
    }

    /// Compiles the discovery pattern lists.
    pub fn pattern_set(&self) -> Result<PatternSet, ConfigError> {
        let parse = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| SpecPattern::from_config_str(pattern))
                .collect::<Vec<_>>()
        };
        let files = parse(&self.files);
        let exclude = parse(&self.exclude);
        let suites = self.suites.as_deref().map(parse);

        Ok(PatternSet::compile(&files, &exclude, suites.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunnerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.parallel().unwrap().get(), 4);
    }

    #[test]
    fn json_round_trip_uses_camel_case() {
        let config = RunnerConfig::from_json(
            r#"{
                "files": ["**/*.spec.ts"],
                "exclude": ["**/node_modules/**"],
                "parallel": 2,
                "bail": true,
                "timeout": 750,
                "testRunners": [{"name": "remote-a"}]
            }"#,
        )
        .unwrap();

        assert_eq!(config.parallel, 2);
        assert!(config.bail);
        assert_eq!(config.timeout, 750);
        assert_eq!(config.test_runners.unwrap()[0].name, "remote-a");
    }

    #[test]
    fn zero_parallel_is_rejected() {
        let err = RunnerConfig::from_json(r#"{"parallel": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveParallel));
        assert_eq!(err.kind(), "ConfigParseFailure");
    }

    #[test]
    fn bad_filters_are_rejected() {
        let err = RunnerConfig::from_json(r#"{"filter": ["("]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Filter(_)));
    }
}
