//! The console surface exposed to sandboxed suites.

use kestrel_schema::Location;

use crate::emit::FrameEmitter;

/// Log severities as carried in the LOG frame's `level` byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Emits LOG frames on behalf of in-sandbox code.
#[derive(Clone)]
pub struct SuiteLogger {
    emitter: FrameEmitter,
}

impl SuiteLogger {
    pub(crate) fn new(emitter: FrameEmitter) -> Self {
        Self { emitter }
    }

    /// Emits one log frame. `context` is a free-form label, typically the
    /// describe path the log was produced under.
    #[track_caller]
    pub fn log(&self, level: LogLevel, context: &str, description: &str) {
        self.log_at(level, context, caller_location(), description);
    }

    /// Like [`SuiteLogger::log`] with an explicit generated-file position.
    pub fn log_at(&self, level: LogLevel, context: &str, location: Location, description: &str) {
        self.emitter.log(level as u8, context, location, description);
    }

    #[track_caller]
    pub fn info(&self, description: &str) {
        self.log_at(LogLevel::Info, "", caller_location(), description);
    }

    #[track_caller]
    pub fn warn(&self, description: &str) {
        self.log_at(LogLevel::Warn, "", caller_location(), description);
    }

    #[track_caller]
    pub fn error(&self, description: &str) {
        self.log_at(LogLevel::Error, "", caller_location(), description);
    }
}

/// The caller's position, zero-based like all wire locations.
#[track_caller]
fn caller_location() -> Location {
    let caller = std::panic::Location::caller();
    Location::new(
        caller.line().saturating_sub(1),
        caller.column().saturating_sub(1),
    )
}
