//! Reporter-facing events and listener plumbing.

use std::{panic::AssertUnwindSafe, path::PathBuf, sync::Arc};

use kestrel_source_map::SourceMapIndex;
use parking_lot::Mutex;

use crate::stack_trace::EnrichedError;

/// A source position resolved back to the original file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLocation {
    /// Original source path, joined onto the suite file's directory.
    pub source: PathBuf,
    /// Zero-based line in the original source.
    pub line: u32,
    /// Zero-based column in the original source.
    pub column: u32,
}

/// A LOG frame, resolved and ready for the reporter.
#[derive(Clone)]
pub struct LogMessage {
    /// Suite path relative to the project root.
    pub suite_name: String,
    /// Human name of the executing runner.
    pub runner_name: String,
    pub level: u8,
    pub context: String,
    pub timestamp: String,
    pub description: String,
    /// The log call's original position, when the map resolves it.
    pub location: Option<ResolvedLocation>,
    /// The suite's source map, for reporters that resolve further.
    pub source_map: Arc<SourceMapIndex>,
}

/// A STATUS frame, expanded for the reporter.
#[derive(Clone)]
pub struct StatusMessage {
    pub suite_name: String,
    pub runner_name: String,
    /// Lowercase kind name (`test`/`suite`/`describe`).
    pub kind: &'static str,
    /// Lowercase status name (`end`/`skip`/`todo`/`start`).
    pub status: &'static str,
    pub ancestry: Vec<String>,
    pub description: String,
    pub source_map: Arc<SourceMapIndex>,
}

/// An ACTION frame, expanded and enriched for the reporter.
#[derive(Clone)]
pub struct ActionMessage {
    pub suite_name: String,
    pub runner_name: String,
    /// Lowercase kind name.
    pub kind: &'static str,
    /// Lowercase action name (`success`/`failure`).
    pub action: &'static str,
    pub ancestry: Vec<String>,
    pub description: String,
    /// Wall-clock duration of the test in milliseconds.
    pub duration_ms: u32,
    /// Enriched errors; empty on success.
    pub errors: Vec<EnrichedError>,
    /// Registration location of the test, resolved when possible.
    pub location: Option<ResolvedLocation>,
    pub source_map: Arc<SourceMapIndex>,
}

/// An ERROR frame, enriched for the reporter.
#[derive(Clone)]
pub struct ErrorMessage {
    pub suite_name: String,
    pub runner_name: String,
    pub error: EnrichedError,
    pub source_map: Arc<SourceMapIndex>,
}

type Listener<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Registered reporter callbacks.
///
/// A listener that panics is logged and dropped from the picture for that
/// event only; reporter failures never reach the coordinator's state
/// machine.
#[derive(Default)]
pub(crate) struct Listeners {
    log: Mutex<Vec<Listener<LogMessage>>>,
    status: Mutex<Vec<Listener<StatusMessage>>>,
    action: Mutex<Vec<Listener<ActionMessage>>>,
    error: Mutex<Vec<Listener<ErrorMessage>>>,
}

impl Listeners {
    pub(crate) fn on_log(&self, listener: Listener<LogMessage>) {
        self.log.lock().push(listener);
    }

    pub(crate) fn on_status(&self, listener: Listener<StatusMessage>) {
        self.status.lock().push(listener);
    }

    pub(crate) fn on_action(&self, listener: Listener<ActionMessage>) {
        self.action.lock().push(listener);
    }

    pub(crate) fn on_error(&self, listener: Listener<ErrorMessage>) {
        self.error.lock().push(listener);
    }

    pub(crate) fn emit_log(&self, message: &LogMessage) {
        Self::emit(&self.log, message, "log");
    }

    pub(crate) fn emit_status(&self, message: &StatusMessage) {
        Self::emit(&self.status, message, "status");
    }

    pub(crate) fn emit_action(&self, message: &ActionMessage) {
        Self::emit(&self.action, message, "action");
    }

    pub(crate) fn emit_error(&self, message: &ErrorMessage) {
        Self::emit(&self.error, message, "error");
    }

    fn emit<M>(listeners: &Mutex<Vec<Listener<M>>>, message: &M, event: &str) {
        let snapshot: Vec<Listener<M>> = listeners.lock().clone();
        for listener in snapshot {
            let result =
                std::panic::catch_unwind(AssertUnwindSafe(|| listener(message)));
            if result.is_err() {
                warn!(event, "reporter listener panicked; continuing");
            }
        }
    }
}
