//! Typed frame model.

use crate::wire::SchemaError;

/// Discriminant of a frame, stored in the first header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// A log line captured inside a sandbox.
    Log = 0,
    /// A serialized error that terminates the suite.
    Error = 1,
    /// A lifecycle status change (start/end/skip/todo).
    Status = 2,
    /// A finished test with its result.
    Action = 3,
}

impl FrameType {
    pub(crate) fn from_u8(value: u8) -> Result<Self, SchemaError> {
        match value {
            0 => Ok(Self::Log),
            1 => Ok(Self::Error),
            2 => Ok(Self::Status),
            3 => Ok(Self::Action),
            other => Err(SchemaError::InvalidSchemaType(other)),
        }
    }
}

/// The kind of node a STATUS or ACTION frame refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Kind {
    Test = 0,
    Suite = 1,
    Describe = 2,
}

impl Kind {
    pub(crate) fn from_u8(value: u8) -> Result<Self, SchemaError> {
        match value {
            0 => Ok(Self::Test),
            1 => Ok(Self::Suite),
            2 => Ok(Self::Describe),
            other => Err(SchemaError::InvalidEnum {
                field: "kind",
                value: other,
            }),
        }
    }

    /// Lowercase name used in reporter-facing records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Suite => "suite",
            Self::Describe => "describe",
        }
    }
}

/// Lifecycle status carried by STATUS frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    End = 0,
    Skip = 1,
    Todo = 2,
    Start = 3,
}

impl Status {
    pub(crate) fn from_u8(value: u8) -> Result<Self, SchemaError> {
        match value {
            0 => Ok(Self::End),
            1 => Ok(Self::Skip),
            2 => Ok(Self::Todo),
            3 => Ok(Self::Start),
            other => Err(SchemaError::InvalidEnum {
                field: "status",
                value: other,
            }),
        }
    }

    /// Lowercase name used in reporter-facing records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::End => "end",
            Self::Skip => "skip",
            Self::Todo => "todo",
            Self::Start => "start",
        }
    }
}

/// Result of a finished test, carried by ACTION frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    Failure = 0,
    Success = 1,
}

impl Action {
    pub(crate) fn from_u8(value: u8) -> Result<Self, SchemaError> {
        match value {
            0 => Ok(Self::Failure),
            1 => Ok(Self::Success),
            other => Err(SchemaError::InvalidEnum {
                field: "action",
                value: other,
            }),
        }
    }

    /// Lowercase name used in reporter-facing records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failure => "failure",
            Self::Success => "success",
        }
    }
}

/// A generated-file position. Lines and columns are zero-based on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Body of a LOG frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogBody {
    /// Numeric log level; the suite side defines the mapping.
    pub level: u8,
    /// Free-form context label (e.g. the current describe path).
    pub context: String,
    /// RFC 3339 timestamp captured in the sandbox.
    pub timestamp: String,
    /// Generated-file position of the log call.
    pub location: Location,
    /// The logged text.
    pub description: String,
}

/// Body of an ERROR frame: one JSON-serialized error object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of a STATUS frame.
///
/// `ancestry` is carried as its JSON encoding so the codec round-trips the
/// payload byte-for-byte; the message handler is the one place that parses
/// it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusBody {
    pub kind: Kind,
    pub status: Status,
    pub ancestry: String,
    pub description: String,
}

/// Body of an ACTION frame: the STATUS prefix plus the result trailer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionBody {
    pub kind: Kind,
    pub action: Action,
    pub ancestry: String,
    pub description: String,
    /// JSON-encoded list of serialized errors; empty list on success.
    pub errors: String,
    /// Wall-clock duration of the test in milliseconds.
    pub duration: u32,
    /// Registration location of the test in the generated file.
    pub location: Location,
}

/// A typed frame body. The wire type byte is derived from the variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameBody {
    Log(LogBody),
    Error(ErrorBody),
    Status(StatusBody),
    Action(ActionBody),
}

impl FrameBody {
    /// The header type byte for this body.
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::Log(_) => FrameType::Log,
            Self::Error(_) => FrameType::Error,
            Self::Status(_) => FrameType::Status,
            Self::Action(_) => FrameType::Action,
        }
    }
}

/// Identifiers stamped into the header of every frame a sandbox emits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WireContext {
    pub suite_id: String,
    pub runner_id: String,
}

impl WireContext {
    pub fn new(suite_id: impl Into<String>, runner_id: impl Into<String>) -> Self {
        Self {
            suite_id: suite_id.into(),
            runner_id: runner_id.into(),
        }
    }
}

/// A decoded frame.
///
/// The identifiers are returned exactly as stored in the header: 14
/// characters with NUL padding preserved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub suite_id: String,
    pub runner_id: String,
    pub body: FrameBody,
}

impl Frame {
    /// The header identifier with trailing NUL padding removed.
    pub fn trimmed_suite_id(&self) -> &str {
        self.suite_id.trim_end_matches('\0')
    }

    /// The header identifier with trailing NUL padding removed.
    pub fn trimmed_runner_id(&self) -> &str {
        self.runner_id.trim_end_matches('\0')
    }
}
