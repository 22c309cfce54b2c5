//! Frame routing edge cases at the coordinator boundary.

use std::collections::BTreeMap;

use kestrel_runner::{CoordinatorError, RunnerConfig, Sandbox, TranspiledSuite};
use kestrel_schema::{encode, ErrorBody, FrameBody, Location, LogBody, SchemaError, WireContext};
use kestrel_suite::TestRegistration;

use crate::common;

fn log_frame(suite_id: &str, runner_id: &str) -> Vec<u8> {
    encode(
        &FrameBody::Log(LogBody {
            level: 2,
            context: String::new(),
            timestamp: "2023-01-01T12:00:00Z".into(),
            location: Location::new(0, 0),
            description: "late frame".into(),
        }),
        &WireContext::new(suite_id, runner_id),
    )
}

#[tokio::test]
async fn frames_for_unknown_suites_are_rejected() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, _recorder, _canonical) =
        common::coordinator(&root, RunnerConfig::default());

    let result = coordinator.dispatch(&log_frame("nosuchsuite00", coordinator.runner_id()));

    assert!(matches!(
        result,
        Err(CoordinatorError::UnregisteredRunner { .. })
    ));
}

#[tokio::test]
async fn unknown_type_bytes_are_rejected() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, _recorder, _canonical) =
        common::coordinator(&root, RunnerConfig::default());

    let mut bytes = encode(
        &FrameBody::Error(ErrorBody { error: "{}".into() }),
        &WireContext::new("s", "r"),
    );
    bytes[0] = 7;

    assert!(matches!(
        coordinator.dispatch(&bytes),
        Err(CoordinatorError::Schema(SchemaError::InvalidSchemaType(7)))
    ));
}

#[tokio::test]
async fn completion_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, _recorder, _canonical) =
        common::coordinator(&root, RunnerConfig::default());

    // Settling a suite that is not running is a no-op, twice over.
    coordinator.complete_suite("nosuchsuite00", false);
    coordinator.complete_suite("nosuchsuite00", true);
}

#[tokio::test]
async fn watch_mode_keeps_source_maps_registered() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, recorder, canonical) =
        common::coordinator(&root, RunnerConfig::default());

    let program = |sandbox: &Sandbox| {
        sandbox
            .suite()
            .describe("group", |s| {
                s.add_test(TestRegistration::new("passes", |_| async { Ok(()) }));
            })
            .map_err(|e| e.to_serialized())?;
        Ok(())
    };

    let mut files = BTreeMap::new();
    files.insert(
        canonical.join("src/watched.spec.js"),
        TranspiledSuite::new(program, common::simple_source_map("watched.spec.ts", 8)),
    );

    let outcome = coordinator.execute_suites(files, true).await;
    let suite_id = outcome.suites["src/watched.spec.js"].suite_id.clone();

    // Late frames still decode against the retained registration; the
    // suite's lifecycle is unaffected.
    let logs_before = recorder.logs.lock().len();
    coordinator
        .dispatch(&log_frame(&suite_id, coordinator.runner_id()))
        .unwrap();
    assert_eq!(recorder.logs.lock().len(), logs_before + 1);
}

#[tokio::test]
async fn without_watch_registrations_are_torn_down() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, _recorder, canonical) =
        common::coordinator(&root, RunnerConfig::default());

    let program = |sandbox: &Sandbox| {
        sandbox
            .suite()
            .describe("group", |s| {
                s.add_test(TestRegistration::new("passes", |_| async { Ok(()) }));
            })
            .map_err(|e| e.to_serialized())?;
        Ok(())
    };

    let mut files = BTreeMap::new();
    files.insert(
        canonical.join("src/oneshot.spec.js"),
        TranspiledSuite::new(program, common::simple_source_map("oneshot.spec.ts", 8)),
    );

    let outcome = coordinator.execute_suites(files, false).await;
    let suite_id = outcome.suites["src/oneshot.spec.js"].suite_id.clone();

    assert!(matches!(
        coordinator.dispatch(&log_frame(&suite_id, coordinator.runner_id())),
        Err(CoordinatorError::UnregisteredRunner { .. })
    ));
}
