//! Bail semantics: the first error frame cancels everything still queued.

use std::collections::BTreeMap;

use kestrel_runner::{RunnerConfig, Sandbox, SuiteStatus, TranspiledSuite};
use kestrel_schema::SerializedError;
use kestrel_suite::TestRegistration;

use crate::common;

fn exploding_suite() -> impl Fn(&Sandbox) -> Result<(), SerializedError> + Send + Sync {
    |_sandbox: &Sandbox| Err(SerializedError::new("Error", "bundle exploded"))
}

fn quiet_suite() -> impl Fn(&Sandbox) -> Result<(), SerializedError> + Send + Sync {
    |sandbox: &Sandbox| {
        sandbox
            .suite()
            .describe("quiet", |s| {
                s.add_test(TestRegistration::new("passes", |_| async { Ok(()) }));
            })
            .map_err(|e| e.to_serialized())?;
        Ok(())
    }
}

#[tokio::test]
async fn bail_rejects_queued_suites_with_the_cancellation_marker() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, recorder, canonical) = common::coordinator(
        &root,
        RunnerConfig {
            parallel: 1,
            bail: true,
            ..RunnerConfig::default()
        },
    );

    let mut files = BTreeMap::new();
    files.insert(
        canonical.join("src/a.spec.js"),
        TranspiledSuite::new(exploding_suite(), common::simple_source_map("a.spec.ts", 4)),
    );
    files.insert(
        canonical.join("src/b.spec.js"),
        TranspiledSuite::new(quiet_suite(), common::simple_source_map("b.spec.ts", 4)),
    );

    let outcome = coordinator.execute_suites(files, false).await;

    assert_eq!(outcome.suites["src/a.spec.js"].status, SuiteStatus::Failed);
    assert_eq!(
        outcome.suites["src/b.spec.js"].status,
        SuiteStatus::Cancelled
    );
    assert!(!outcome.is_success());

    // The cancelled suite never started: no frames, no end.
    assert_eq!(recorder.suite_ends("src/b.spec.js"), 0);
    assert_eq!(recorder.errors.lock().len(), 1);
    assert_eq!(coordinator.queue_size(), 0);
}

#[tokio::test]
async fn without_bail_the_remaining_suites_still_run() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, recorder, canonical) = common::coordinator(
        &root,
        RunnerConfig {
            parallel: 1,
            bail: false,
            ..RunnerConfig::default()
        },
    );

    let mut files = BTreeMap::new();
    files.insert(
        canonical.join("src/a.spec.js"),
        TranspiledSuite::new(exploding_suite(), common::simple_source_map("a.spec.ts", 4)),
    );
    files.insert(
        canonical.join("src/b.spec.js"),
        TranspiledSuite::new(quiet_suite(), common::simple_source_map("b.spec.ts", 4)),
    );

    let outcome = coordinator.execute_suites(files, false).await;

    assert_eq!(outcome.suites["src/a.spec.js"].status, SuiteStatus::Failed);
    assert_eq!(outcome.suites["src/b.spec.js"].status, SuiteStatus::Passed);
    assert_eq!(recorder.suite_ends("src/b.spec.js"), 1);
}
