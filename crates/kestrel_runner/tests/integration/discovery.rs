//! Discovery wired through the coordinator's project pipeline.

use std::fs;

use kestrel_runner::{RunnerConfig, Sandbox, TranspiledSuite};
use kestrel_suite::TestRegistration;

use crate::common;

#[tokio::test]
async fn run_project_discovers_transpiles_and_executes() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("src")).unwrap();
    fs::create_dir_all(root.path().join("node_modules/dep")).unwrap();
    fs::write(root.path().join("src/login.spec.ts"), "// spec").unwrap();
    fs::write(root.path().join("src/helper.ts"), "// not a spec").unwrap();
    fs::write(root.path().join("node_modules/dep/x.spec.ts"), "// ignored").unwrap();

    let (coordinator, recorder, _canonical) = common::coordinator(
        &root,
        RunnerConfig {
            files: vec!["**/*.spec.ts".to_owned()],
            exclude: vec!["**/node_modules".to_owned(), "**/node_modules/**".to_owned()],
            ..RunnerConfig::default()
        },
    );

    let outcome = coordinator
        .run_project(
            |_abs_path| {
                Ok(TranspiledSuite::new(
                    |sandbox: &Sandbox| {
                        sandbox
                            .suite()
                            .describe("Login", |s| {
                                s.add_test(TestRegistration::new("works", |_| async { Ok(()) }));
                            })
                            .map_err(|e| e.to_serialized())?;
                        Ok(())
                    },
                    common::simple_source_map("login.spec.ts", 8),
                ))
            },
            false,
        )
        .await
        .unwrap();

    assert_eq!(outcome.suites.len(), 1);
    assert!(outcome.suites.contains_key("src/login.spec.ts"));
    assert!(outcome.is_success());
    assert_eq!(recorder.suite_ends("src/login.spec.ts"), 1);
}

#[tokio::test]
async fn transpiler_failures_surface_through_run_project() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("src")).unwrap();
    fs::write(root.path().join("src/broken.spec.ts"), "// spec").unwrap();

    let (coordinator, _recorder, _canonical) = common::coordinator(
        &root,
        RunnerConfig {
            files: vec!["**/*.spec.ts".to_owned()],
            ..RunnerConfig::default()
        },
    );

    let result = coordinator
        .run_project(|_abs_path| eyre::bail!("syntax error"), false)
        .await;

    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("failed to transpile"));
    assert!(message.contains("syntax error"));
}
