//! Translates decoded frames into reporter-facing messages.

use std::{path::Path, sync::Arc};

use kestrel_schema::{ActionBody, ErrorBody, LogBody, SerializedError, StatusBody};
use kestrel_source_map::{SourceMapIndex, SourceMapLookup};

use crate::{
    events::{ActionMessage, ErrorMessage, LogMessage, ResolvedLocation, StatusMessage},
    stack_trace::{enrich, EnrichedError, PlainSnippetFormatter, SnippetFormatter, StackTraceOptions},
};

/// Builds reporter records from decoded frame bodies.
///
/// Every JSON payload inside a frame is parsed tolerantly: malformed
/// ancestry or error lists degrade to empty values with a logged warning,
/// never a propagated failure.
pub struct MessageHandler {
    options: StackTraceOptions,
    formatter: Arc<dyn SnippetFormatter>,
}

impl Default for MessageHandler {
    fn default() -> Self {
        Self {
            options: StackTraceOptions::default(),
            formatter: Arc::new(PlainSnippetFormatter),
        }
    }
}

impl MessageHandler {
    pub fn new(options: StackTraceOptions, formatter: Arc<dyn SnippetFormatter>) -> Self {
        Self { options, formatter }
    }

    pub fn log_message(
        &self,
        body: &LogBody,
        suite_name: &str,
        runner_name: &str,
        map: &Arc<SourceMapIndex>,
    ) -> LogMessage {
        LogMessage {
            suite_name: suite_name.to_owned(),
            runner_name: runner_name.to_owned(),
            level: body.level,
            context: body.context.clone(),
            timestamp: body.timestamp.clone(),
            description: body.description.clone(),
            location: resolve_location(map, body.location.line, body.location.column),
            source_map: Arc::clone(map),
        }
    }

    pub fn status_message(
        &self,
        body: &StatusBody,
        suite_name: &str,
        runner_name: &str,
        map: &Arc<SourceMapIndex>,
    ) -> StatusMessage {
        StatusMessage {
            suite_name: suite_name.to_owned(),
            runner_name: runner_name.to_owned(),
            kind: body.kind.as_str(),
            status: body.status.as_str(),
            ancestry: parse_ancestry(&body.ancestry),
            description: body.description.clone(),
            source_map: Arc::clone(map),
        }
    }

    pub fn action_message(
        &self,
        body: &ActionBody,
        suite_name: &str,
        runner_name: &str,
        map: &Arc<SourceMapIndex>,
    ) -> ActionMessage {
        ActionMessage {
            suite_name: suite_name.to_owned(),
            runner_name: runner_name.to_owned(),
            kind: body.kind.as_str(),
            action: body.action.as_str(),
            ancestry: parse_ancestry(&body.ancestry),
            description: body.description.clone(),
            duration_ms: body.duration,
            errors: self.enrich_action_errors(&body.errors, map),
            location: resolve_location(map, body.location.line, body.location.column),
            source_map: Arc::clone(map),
        }
    }

    pub fn error_message(
        &self,
        body: &ErrorBody,
        suite_name: &str,
        runner_name: &str,
        map: &Arc<SourceMapIndex>,
    ) -> ErrorMessage {
        let error = SerializedError::from_json(&body.error).unwrap_or_else(|parse_error| {
            warn!(%parse_error, "unparseable error payload; degrading to raw message");
            SerializedError::new("Error", body.error.clone())
        });
        ErrorMessage {
            suite_name: suite_name.to_owned(),
            runner_name: runner_name.to_owned(),
            error: self.enrich_error(&error, map),
            source_map: Arc::clone(map),
        }
    }

    /// Parses an ACTION error list; malformed payloads yield an empty list.
    fn enrich_action_errors(&self, payload: &str, map: &Arc<SourceMapIndex>) -> Vec<EnrichedError> {
        let errors: Vec<SerializedError> = match serde_json::from_str(payload) {
            Ok(errors) => errors,
            Err(parse_error) => {
                warn!(%parse_error, "unparseable action error list; degrading to empty");
                Vec::new()
            }
        };
        errors
            .iter()
            .map(|error| self.enrich_error(error, map))
            .collect()
    }

    /// A `Failing`/`Timeout` error's own location resolves directly; every
    /// other kind derives its position from the stack string.
    fn enrich_error(&self, error: &SerializedError, map: &Arc<SourceMapIndex>) -> EnrichedError {
        if error.has_direct_location() {
            enrich(error, map, &self.options, self.formatter.as_ref())
        } else {
            let mut stripped = error.clone();
            stripped.location = None;
            enrich(&stripped, map, &self.options, self.formatter.as_ref())
        }
    }
}

fn parse_ancestry(payload: &str) -> Vec<String> {
    serde_json::from_str(payload).unwrap_or_else(|parse_error| {
        warn!(%parse_error, "unparseable ancestry payload; degrading to empty");
        Vec::new()
    })
}

fn resolve_location(map: &Arc<SourceMapIndex>, line: u32, column: u32) -> Option<ResolvedLocation> {
    let position = map.resolve(line, column)?;
    let source = map
        .generated_path()
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(&position.source);
    Some(ResolvedLocation {
        source,
        line: position.line,
        column: position.column,
    })
}
