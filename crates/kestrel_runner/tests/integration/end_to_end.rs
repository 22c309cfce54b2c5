//! Full pipeline: transpiled bundles through sandboxes to reporter events.

use std::{collections::BTreeMap, sync::Arc};

use kestrel_mock::MockRegistry;
use kestrel_runner::{RunnerConfig, Sandbox, SuiteStatus, TranspiledSuite};
use kestrel_suite::{expect::expect_value, SuiteLogger, TestRegistration};
use parking_lot::Mutex;

use crate::common;

#[tokio::test]
async fn suites_stream_events_and_settle() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, recorder, canonical) = common::coordinator(
        &root,
        RunnerConfig {
            parallel: 2,
            ..RunnerConfig::default()
        },
    );

    let mut files = BTreeMap::new();
    files.insert(
        canonical.join("src/pass.spec.js"),
        TranspiledSuite::new(
            |sandbox: &Sandbox| {
                sandbox
                    .suite()
                    .describe("Login", |s| {
                        s.add_test(TestRegistration::new("accepts credentials", |_| async {
                            Ok(())
                        }));
                        s.add_test(
                            TestRegistration::new("slow path", |_| async { Ok(()) }).skip(),
                        );
                    })
                    .map_err(|e| e.to_serialized())?;
                Ok(())
            },
            common::simple_source_map("pass.spec.ts", 4096),
        ),
    );
    files.insert(
        canonical.join("src/fail.spec.js"),
        TranspiledSuite::new(
            |sandbox: &Sandbox| {
                sandbox
                    .suite()
                    .describe("Cart", |s| {
                        s.add_test(TestRegistration::new("computes totals", |_| async {
                            let total = serde_json::json!(5);
                            expect_value(total).to_equal(&serde_json::json!(4))?;
                            Ok(())
                        }));
                    })
                    .map_err(|e| e.to_serialized())?;
                Ok(())
            },
            common::simple_source_map("fail.spec.ts", 4096),
        ),
    );

    let outcome = coordinator.execute_suites(files, false).await;

    // A failing test fails the tally, not the suite lifecycle.
    let pass = &outcome.suites["src/pass.spec.js"];
    assert_eq!(pass.status, SuiteStatus::Passed);
    assert_eq!((pass.tally.passed, pass.tally.skipped), (1, 1));

    let fail = &outcome.suites["src/fail.spec.js"];
    assert_eq!(fail.status, SuiteStatus::Passed);
    assert_eq!(fail.tally.failed, 1);

    assert_eq!(recorder.suite_ends("src/pass.spec.js"), 1);
    assert_eq!(recorder.suite_ends("src/fail.spec.js"), 1);

    let actions = recorder.actions.lock();
    let breaks = actions
        .iter()
        .find(|record| record.description == "computes totals")
        .expect("failure action is reported");
    assert_eq!(breaks.action, "failure");
    assert_eq!(breaks.ancestry, vec!["Cart".to_owned()]);
    assert_eq!(breaks.error_names, vec!["Failing".to_owned()]);
    // The failing-kind error's own location resolves through the map.
    assert!(breaks.mapped_lines[0].is_some());

    let starts = recorder
        .statuses
        .lock()
        .iter()
        .filter(|(name, kind, status, _)| {
            name == "src/pass.spec.js" && kind == "test" && status == "start"
        })
        .count();
    assert_eq!(starts, 1);
}

#[tokio::test]
async fn empty_suites_fail_without_an_end() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, recorder, canonical) =
        common::coordinator(&root, RunnerConfig::default());

    let mut files = BTreeMap::new();
    files.insert(
        canonical.join("src/empty.spec.js"),
        TranspiledSuite::new(
            |_sandbox: &Sandbox| Ok(()),
            common::simple_source_map("empty.spec.ts", 4),
        ),
    );

    let outcome = coordinator.execute_suites(files, false).await;

    assert_eq!(
        outcome.suites["src/empty.spec.js"].status,
        SuiteStatus::Failed
    );
    assert_eq!(recorder.suite_ends("src/empty.spec.js"), 0);

    let errors = recorder.errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "src/empty.spec.js");
    assert_eq!(errors[0].1, "EmptySuite");
}

#[tokio::test]
async fn configured_filters_focus_tests_across_the_pipeline() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, recorder, canonical) = common::coordinator(
        &root,
        RunnerConfig {
            filter: vec!["Login".to_owned(), "accepts valid credentials".to_owned()],
            ..RunnerConfig::default()
        },
    );

    let mut files = BTreeMap::new();
    files.insert(
        canonical.join("src/auth.spec.js"),
        TranspiledSuite::new(
            |sandbox: &Sandbox| {
                sandbox
                    .suite()
                    .describe("Login", |s| {
                        s.add_test(TestRegistration::new("accepts valid credentials", |_| async {
                            Ok(())
                        }));
                        s.add_test(TestRegistration::new("shows a banner", |_| async { Ok(()) }));
                    })
                    .map_err(|e| e.to_serialized())?;
                sandbox
                    .suite()
                    .describe("Cart", |s| {
                        s.add_test(TestRegistration::new("sums totals", |_| async { Ok(()) }));
                    })
                    .map_err(|e| e.to_serialized())?;
                Ok(())
            },
            common::simple_source_map("auth.spec.ts", 4096),
        ),
    );

    let outcome = coordinator.execute_suites(files, false).await;

    let suite = &outcome.suites["src/auth.spec.js"];
    assert_eq!(suite.status, SuiteStatus::Passed);
    assert_eq!((suite.tally.passed, suite.tally.skipped), (1, 2));

    let actions = recorder.actions.lock();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].description, "accepts valid credentials");
}

#[tokio::test]
async fn logs_flow_and_mocks_are_restored() {
    let root = tempfile::tempdir().unwrap();
    let (coordinator, recorder, canonical) =
        common::coordinator(&root, RunnerConfig::default());

    let seen_registry: Arc<Mutex<Option<MockRegistry>>> = Arc::new(Mutex::new(None));
    let registry_probe = Arc::clone(&seen_registry);

    let mut files = BTreeMap::new();
    files.insert(
        canonical.join("src/logging.spec.js"),
        TranspiledSuite::new(
            move |sandbox: &Sandbox| {
                *registry_probe.lock() = Some(sandbox.mocks().clone());

                let logger: SuiteLogger = sandbox.logger().clone();
                let mocks = sandbox.mocks().clone();
                sandbox
                    .suite()
                    .describe("Telemetry", move |s| {
                        let logger = logger.clone();
                        let mocks = mocks.clone();
                        s.add_test(TestRegistration::new("emits a log", move |_| {
                            let logger = logger.clone();
                            let mocks = mocks.clone();
                            async move {
                                logger.info("hello from the sandbox");
                                // A mock the body never restores itself.
                                let forgotten = mocks.mock_fn(None, None, Some("forgotten"));
                                forgotten.call(kestrel_mock::Value::Undefined, Vec::new());
                                Ok(())
                            }
                        }));
                    })
                    .map_err(|e| e.to_serialized())?;
                Ok(())
            },
            common::simple_source_map("logging.spec.ts", 4096),
        ),
    );

    let outcome = coordinator.execute_suites(files, false).await;
    assert!(outcome.is_success());

    let logs = recorder.logs.lock();
    assert!(logs
        .iter()
        .any(|(suite, text)| suite == "src/logging.spec.js" && text == "hello from the sandbox"));

    // The test-end hook restored the survivor.
    let registry = seen_registry.lock().clone().expect("program ran");
    assert!(registry.is_empty());
}
