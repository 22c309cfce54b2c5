//! Test-path filter chains.

use regex::Regex;

use crate::error::SuiteError;

/// The compiled filter chain of a suite, built once from the runtime
/// context.
///
/// A path of length `n` matches a chain of length `k <= n` iff the last `k`
/// path segments match the `k` regexes in order. The empty chain matches
/// every path; an empty path matches only the empty chain.
#[derive(Clone, Debug, Default)]
pub struct FilterChain {
    regexes: Vec<Regex>,
}

impl FilterChain {
    /// Compiles configuration filter strings, anchoring each one.
    pub fn compile(patterns: &[String]) -> Result<Self, SuiteError> {
        let regexes = patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
                    SuiteError::InvalidFilter {
                        pattern: pattern.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { regexes })
    }

    /// Builds a chain from pre-compiled regexes, used as-is.
    pub fn from_regexes(regexes: Vec<Regex>) -> Self {
        Self { regexes }
    }

    pub fn is_empty(&self) -> bool {
        self.regexes.is_empty()
    }

    /// Whether the chain matches the tail of `path`.
    pub fn matches(&self, path: &[String]) -> bool {
        let k = self.regexes.len();
        if k > path.len() {
            return false;
        }
        let tail = &path[path.len() - k..];
        self.regexes
            .iter()
            .zip(tail)
            .all(|(regex, segment)| regex.is_match(segment))
    }
}
