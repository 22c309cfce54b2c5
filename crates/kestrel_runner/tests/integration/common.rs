//! Shared helpers for coordinator integration tests.

use std::{path::PathBuf, sync::Arc};

use kestrel_runner::{
    ActionMessage, ErrorMessage, LogMessage, RunnerConfig, StatusMessage, TestCoordinator,
};
use kestrel_source_map::{MappingToken, SourceMapData};
use parking_lot::Mutex;

/// Reporter events captured during a run.
#[derive(Clone, Default)]
pub struct Recorder {
    pub statuses: Arc<Mutex<Vec<(String, String, String, String)>>>,
    pub actions: Arc<Mutex<Vec<ActionRecord>>>,
    pub errors: Arc<Mutex<Vec<(String, String, String)>>>,
    pub logs: Arc<Mutex<Vec<(String, String)>>>,
}

#[derive(Clone, Debug)]
pub struct ActionRecord {
    pub suite_name: String,
    pub action: String,
    pub description: String,
    pub ancestry: Vec<String>,
    pub error_names: Vec<String>,
    pub mapped_lines: Vec<Option<u32>>,
}

impl Recorder {
    pub fn attach(&self, coordinator: &TestCoordinator) {
        let statuses = Arc::clone(&self.statuses);
        coordinator.on_status(move |message: &StatusMessage| {
            statuses.lock().push((
                message.suite_name.clone(),
                message.kind.to_owned(),
                message.status.to_owned(),
                message.description.clone(),
            ));
        });

        let actions = Arc::clone(&self.actions);
        coordinator.on_action(move |message: &ActionMessage| {
            actions.lock().push(ActionRecord {
                suite_name: message.suite_name.clone(),
                action: message.action.to_owned(),
                description: message.description.clone(),
                ancestry: message.ancestry.clone(),
                error_names: message.errors.iter().map(|e| e.name.clone()).collect(),
                mapped_lines: message.errors.iter().map(|e| e.line).collect(),
            });
        });

        let errors = Arc::clone(&self.errors);
        coordinator.on_error(move |message: &ErrorMessage| {
            errors.lock().push((
                message.suite_name.clone(),
                message.error.name.clone(),
                message.error.message.clone(),
            ));
        });

        let logs = Arc::clone(&self.logs);
        coordinator.on_log(move |message: &LogMessage| {
            logs.lock()
                .push((message.suite_name.clone(), message.description.clone()));
        });
    }

    pub fn suite_ends(&self, suite_name: &str) -> usize {
        self.statuses
            .lock()
            .iter()
            .filter(|(name, kind, status, _)| {
                name == suite_name && kind == "suite" && status == "end"
            })
            .count()
    }
}

/// A one-source map with an identity-ish token per generated line.
pub fn simple_source_map(source: &str, lines: u32) -> SourceMapData {
    SourceMapData {
        file: None,
        source_root: None,
        sources: vec![source.to_owned()],
        sources_content: vec![Some(
            (0..lines)
                .map(|line| format!("original line {line}"))
                .collect::<Vec<_>>()
                .join("\n"),
        )],
        tokens: (0..lines)
            .map(|line| MappingToken {
                generated_line: line,
                generated_column: 0,
                source_index: 0,
                original_line: line,
                original_column: 0,
            })
            .collect(),
    }
}

pub fn coordinator(
    root: &tempfile::TempDir,
    config: RunnerConfig,
) -> (TestCoordinator, Recorder, PathBuf) {
    let coordinator = TestCoordinator::new(root.path(), config).unwrap();
    let recorder = Recorder::default();
    recorder.attach(&coordinator);
    let canonical = dunce::canonicalize(root.path()).unwrap_or_else(|_| root.path().to_path_buf());
    (coordinator, recorder, canonical)
}
