//! The immutable runtime record injected into every sandbox.

use serde::{Deserialize, Serialize};

/// Per-sandbox runtime context.
///
/// Built by the coordinator before a sandbox is spawned and immutable for
/// the sandbox's lifetime.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeContext {
    /// Stop-on-first-failure mode.
    pub bail: bool,
    /// Focus filters, compiled once into the suite's filter chain.
    pub filter: Vec<String>,
    /// Default per-test timeout in milliseconds.
    pub timeout: u64,
    /// Whether child order is shuffled.
    pub randomize: bool,
    /// Identifier of this suite, stamped into every frame header.
    pub suite_id: String,
    /// Identifier of the executing runner.
    pub runner_id: String,
    /// Suite path relative to the project root.
    pub relative_path: String,
    /// Seed for the shuffle RNG; drawn by the coordinator when randomizing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self {
            bail: false,
            filter: Vec::new(),
            timeout: 5_000,
            randomize: false,
            suite_id: String::new(),
            runner_id: String::new(),
            relative_path: String::new(),
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let context = RuntimeContext {
            suite_id: "abc".into(),
            relative_path: "src/a.spec.ts".into(),
            ..Default::default()
        };

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["suiteId"], "abc");
        assert_eq!(json["relativePath"], "src/a.spec.ts");
        assert!(json.get("seed").is_none());
    }
}
