//! The JSON error object carried by ERROR frames and ACTION error lists.

use serde::{Deserialize, Serialize};

use crate::frames::Location;

/// Error kinds that carry a directly usable source position.
pub const KIND_FAILING: &str = "Failing";
/// Error kind injected when a test body loses its timeout race.
pub const KIND_TIMEOUT: &str = "Timeout";
/// Error kind raised when a suite registers no tests.
pub const KIND_EMPTY_SUITE: &str = "EmptySuite";

/// A serializable error as it travels over the wire.
///
/// The shape is `{name, message, stack?, location?, ...ownProps}`; unknown
/// properties survive a round trip through [`SerializedError::extra`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedError {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ErrorLocation>,
    /// The error this one was raised from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<SerializedError>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Position attached to an error, zero-based like frame locations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

impl From<Location> for ErrorLocation {
    fn from(location: Location) -> Self {
        Self {
            line: location.line,
            column: location.column,
        }
    }
}

impl SerializedError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            location: None,
            cause: None,
            extra: serde_json::Map::new(),
        }
    }

    /// The error injected when a test body exceeds its timeout.
    pub fn timeout(timeout_ms: u64, location: Option<ErrorLocation>) -> Self {
        let mut error = Self::new(KIND_TIMEOUT, format!("Exceeded timeout of {timeout_ms} ms"));
        error.location = location;
        error
    }

    /// An assertion-style failure with its registration position.
    pub fn failing(message: impl Into<String>, location: Option<ErrorLocation>) -> Self {
        let mut error = Self::new(KIND_FAILING, message);
        error.location = location;
        error
    }

    /// The error raised when a suite finishes registration without tests.
    pub fn empty_suite(relative_path: &str) -> Self {
        Self::new(
            KIND_EMPTY_SUITE,
            format!("no tests were registered by suite '{relative_path}'"),
        )
    }

    /// Captures any [`std::error::Error`] under the given kind name.
    pub fn from_error(name: impl Into<String>, error: &dyn std::error::Error) -> Self {
        Self::new(name, error.to_string())
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_cause(mut self, cause: SerializedError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Whether the error kind carries a position that can be resolved
    /// directly, without consulting the stack string.
    pub fn has_direct_location(&self) -> bool {
        self.location.is_some() && matches!(self.name.as_str(), KIND_FAILING | KIND_TIMEOUT)
    }

    /// The wire representation used in ERROR frame bodies.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("error object has no non-serializable fields")
    }

    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

impl std::fmt::Display for SerializedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}
