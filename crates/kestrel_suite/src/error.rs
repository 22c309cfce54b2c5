//! Suite-level errors.

use kestrel_schema::SerializedError;

/// Errors raised by suite registration and execution.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    /// Registration finished without a single test.
    #[error("no tests were registered by suite '{relative_path}'")]
    EmptySuite {
        /// Suite path relative to the project root.
        relative_path: String,
    },

    /// `add_describe` was called from inside an executing test body.
    #[error("describe blocks cannot be registered while a test is executing")]
    NestedDescribeInTest,

    /// A runtime-context filter string did not compile.
    #[error("invalid filter pattern '{pattern}': {source}")]
    InvalidFilter {
        /// The offending pattern.
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl SuiteError {
    /// The error-taxonomy kind used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptySuite { .. } => "EmptySuite",
            Self::NestedDescribeInTest => "NestedDescribeInTest",
            Self::InvalidFilter { .. } => "ConfigParseFailure",
        }
    }

    /// The wire form of this error.
    pub fn to_serialized(&self) -> SerializedError {
        SerializedError::new(self.kind(), self.to_string())
    }
}
