//! The suite state machine: registration and ordered execution.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use futures::{future::BoxFuture, FutureExt};
use kestrel_mock::MockRegistry;
use kestrel_schema::{Action, Kind, SerializedError, Status};
use parking_lot::Mutex;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    context::RuntimeContext,
    each::{format_case_description, EachCase},
    emit::{DispatchFn, FrameEmitter},
    error::SuiteError,
    filter::FilterChain,
    hooks::{Hook, HookKind},
    logger::SuiteLogger,
    test::TestRegistration,
};

/// Registration flags on a describe block.
#[derive(Clone, Copy, Debug, Default)]
pub struct DescribeFlags {
    pub skip: bool,
    pub only: bool,
}

struct DescribeNode {
    description: String,
    /// Ancestor descriptions from the root down, root excluded.
    ancestry: Vec<String>,
    flags: DescribeFlags,
    effective_skip: bool,
    effective_only: bool,
    describes: Vec<usize>,
    tests: Vec<usize>,
    hooks: Vec<Hook>,
}

struct TestNode {
    registration: TestRegistration,
    ancestry: Vec<String>,
    effective_skip: bool,
    effective_only: bool,
}

struct Tree {
    describes: Vec<DescribeNode>,
    tests: Vec<TestNode>,
    /// Index of the describe registration currently appends into.
    current: usize,
}

impl Tree {
    /// The ancestry a child registered under `index` receives.
    fn child_ancestry(&self, index: usize) -> Vec<String> {
        if index == 0 {
            return Vec::new();
        }
        let node = &self.describes[index];
        let mut ancestry = node.ancestry.clone();
        ancestry.push(node.description.clone());
        ancestry
    }
}

/// Restores the registration cursor on every exit path, panics included.
struct CursorGuard<'a> {
    tree: &'a Mutex<Tree>,
    previous: usize,
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        self.tree.lock().current = self.previous;
    }
}

/// Introspection view of a registered describe.
#[derive(Clone, Debug)]
pub struct DescribeSnapshot {
    pub description: String,
    pub ancestry: Vec<String>,
    pub describes: Vec<DescribeSnapshot>,
    pub tests: Vec<TestSnapshot>,
}

/// Introspection view of a registered test.
#[derive(Clone, Debug)]
pub struct TestSnapshot {
    pub description: String,
    pub ancestry: Vec<String>,
    pub effective_skip: bool,
    pub effective_only: bool,
}

/// One sandbox's suite: registration tree, flags, filters, and emission.
///
/// Registration happens strictly before execution; the sandbox host
/// evaluates the bundle first and only then calls [`SuiteState::run`].
pub struct SuiteState {
    context: RuntimeContext,
    filters: FilterChain,
    emitter: FrameEmitter,
    mocks: MockRegistry,
    tree: Mutex<Tree>,
    /// Process-wide latch: set once, never unset.
    only_mode: AtomicBool,
    executing_test: AtomicBool,
    has_tests: AtomicBool,
}

impl SuiteState {
    /// Creates the suite for one sandbox, compiling the context's filter
    /// chain once.
    pub fn new(context: RuntimeContext, dispatch: DispatchFn) -> Result<Arc<Self>, SuiteError> {
        let filters = FilterChain::compile(&context.filter)?;
        let emitter = FrameEmitter::new(dispatch, &context.suite_id, &context.runner_id);

        Ok(Arc::new(Self {
            context,
            filters,
            emitter,
            mocks: MockRegistry::new(),
            tree: Mutex::new(Tree {
                describes: vec![DescribeNode {
                    description: String::new(),
                    ancestry: Vec::new(),
                    flags: DescribeFlags::default(),
                    effective_skip: false,
                    effective_only: false,
                    describes: Vec::new(),
                    tests: Vec::new(),
                    hooks: Vec::new(),
                }],
                tests: Vec::new(),
                current: 0,
            }),
            only_mode: AtomicBool::new(false),
            executing_test: AtomicBool::new(false),
            has_tests: AtomicBool::new(false),
        }))
    }

    /// The injected runtime context.
    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    /// The sandbox's mock registry; the test-end hook restores through it.
    pub fn mocks(&self) -> &MockRegistry {
        &self.mocks
    }

    /// A logger bound to this suite's wire context.
    pub fn logger(&self) -> SuiteLogger {
        SuiteLogger::new(self.emitter.clone())
    }

    /// Whether the only-mode latch has been set.
    pub fn only_mode(&self) -> bool {
        self.only_mode.load(Ordering::SeqCst)
    }

    /// Whether any test has been registered.
    pub fn has_tests(&self) -> bool {
        self.has_tests.load(Ordering::SeqCst)
    }

    fn filter_hit(&self, path: &[String]) -> bool {
        !self.filters.is_empty() && self.filters.matches(path)
    }

    /// Registers a describe block and runs `body` with the cursor moved
    /// into it. The cursor is restored on every exit path.
    pub fn add_describe(
        &self,
        description: &str,
        flags: DescribeFlags,
        body: impl FnOnce(&Self),
    ) -> Result<(), SuiteError> {
        if self.executing_test.load(Ordering::SeqCst) {
            return Err(SuiteError::NestedDescribeInTest);
        }

        let previous = {
            let mut tree = self.tree.lock();
            let previous = tree.current;
            let ancestry = tree.child_ancestry(previous);

            let mut path = ancestry.clone();
            path.push(description.to_owned());
            let filter_hit = self.filter_hit(&path);

            let parent = &tree.describes[previous];
            let node = DescribeNode {
                description: description.to_owned(),
                ancestry,
                flags,
                effective_skip: flags.skip || parent.effective_skip,
                effective_only: flags.only || parent.effective_only || filter_hit,
                describes: Vec::new(),
                tests: Vec::new(),
                hooks: Vec::new(),
            };

            if flags.only || filter_hit {
                self.only_mode.store(true, Ordering::SeqCst);
            }

            let index = tree.describes.len();
            tree.describes.push(node);
            tree.describes[previous].describes.push(index);
            tree.current = index;
            previous
        };

        let guard = CursorGuard {
            tree: &self.tree,
            previous,
        };
        body(self);
        drop(guard);

        Ok(())
    }

    /// Registers a test under the current describe, deriving its ancestry
    /// and effective flags at insertion.
    pub fn add_test(&self, registration: TestRegistration) {
        let mut tree = self.tree.lock();
        let current = tree.current;
        let ancestry = tree.child_ancestry(current);

        let mut path = ancestry.clone();
        path.push(registration.description.clone());
        let filter_hit = self.filter_hit(&path);

        let parent = &tree.describes[current];
        let node = TestNode {
            ancestry,
            effective_skip: registration.options.skip || parent.effective_skip,
            effective_only: registration.options.only || parent.effective_only || filter_hit,
            registration,
        };

        if node.registration.options.only || filter_hit {
            self.only_mode.store(true, Ordering::SeqCst);
        }

        let index = tree.tests.len();
        tree.tests.push(node);
        tree.describes[current].tests.push(index);
        self.has_tests.store(true, Ordering::SeqCst);
    }

    /// Registers a lifecycle hook on the current describe.
    pub fn add_hook(&self, hook: Hook) {
        let mut tree = self.tree.lock();
        let current = tree.current;
        tree.describes[current].hooks.push(hook);
    }

    // Convenience registration surface used by bundles.

    /// Runs once before anything in the current describe's subtree.
    #[track_caller]
    pub fn before_all<F, Fut>(&self, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), crate::test::TestFailure>> + Send + 'static,
    {
        self.add_hook(Hook::new(HookKind::BeforeAll, body));
    }

    /// Runs once after everything in the current describe's subtree.
    #[track_caller]
    pub fn after_all<F, Fut>(&self, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), crate::test::TestFailure>> + Send + 'static,
    {
        self.add_hook(Hook::new(HookKind::AfterAll, body));
    }

    /// Runs before every test in the current describe's subtree.
    #[track_caller]
    pub fn before_each<F, Fut>(&self, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), crate::test::TestFailure>> + Send + 'static,
    {
        self.add_hook(Hook::new(HookKind::BeforeEach, body));
    }

    /// Runs after every test in the current describe's subtree.
    #[track_caller]
    pub fn after_each<F, Fut>(&self, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), crate::test::TestFailure>> + Send + 'static,
    {
        self.add_hook(Hook::new(HookKind::AfterEach, body));
    }

    pub fn describe(&self, description: &str, body: impl FnOnce(&Self)) -> Result<(), SuiteError> {
        self.add_describe(description, DescribeFlags::default(), body)
    }

    pub fn describe_skip(
        &self,
        description: &str,
        body: impl FnOnce(&Self),
    ) -> Result<(), SuiteError> {
        self.add_describe(
            description,
            DescribeFlags {
                skip: true,
                only: false,
            },
            body,
        )
    }

    pub fn describe_only(
        &self,
        description: &str,
        body: impl FnOnce(&Self),
    ) -> Result<(), SuiteError> {
        self.add_describe(
            description,
            DescribeFlags {
                skip: false,
                only: true,
            },
            body,
        )
    }

    /// Registers one describe per case, interpolating the description
    /// template and passing the case arguments to `body`.
    pub fn describe_each(
        &self,
        cases: &[EachCase],
        template: &str,
        body: impl Fn(&Self, &[Value]),
    ) -> Result<(), SuiteError> {
        for (index, case) in cases.iter().enumerate() {
            let description = format_case_description(template, case, index);
            self.add_describe(&description, DescribeFlags::default(), |state| {
                body(state, &case.args);
            })?;
        }
        Ok(())
    }

    /// Registers one test per case, interpolating the description template.
    pub fn test_each(&self, cases: &[EachCase], template: &str, registration: &TestRegistration) {
        for (index, case) in cases.iter().enumerate() {
            let mut test = registration.clone();
            test.description = format_case_description(template, case, index);
            test.args = case.args.clone();
            self.add_test(test);
        }
    }

    /// Introspection snapshot of the registered tree, rooted at the
    /// (unnamed) root describe.
    pub fn snapshot(&self) -> DescribeSnapshot {
        let tree = self.tree.lock();
        snapshot_of(&tree, 0)
    }

    /// Runs the registered tree.
    ///
    /// Success emits exactly one `STATUS=END` suite frame; any suite-level
    /// error (including an empty registration) is serialized into an ERROR
    /// frame instead, with no END.
    pub async fn run(self: &Arc<Self>) {
        debug!(suite = %self.context.relative_path, "running suite");
        match self.run_root().await {
            Ok(()) => self
                .emitter
                .status(Kind::Suite, Status::End, &[], ""),
            Err(error) => self.emitter.error(&error),
        }
    }

    async fn run_root(self: &Arc<Self>) -> Result<(), SerializedError> {
        if !self.has_tests() {
            return Err(SuiteError::EmptySuite {
                relative_path: self.context.relative_path.clone(),
            }
            .to_serialized());
        }

        let rng = self.context.randomize.then(|| {
            let seed = self
                .context
                .seed
                .unwrap_or_else(|| rand::rng().random::<u64>());
            trace!(seed, "shuffling suite order");
            Mutex::new(StdRng::seed_from_u64(seed))
        });

        self.run_describe(0, &rng, Vec::new(), Vec::new(), None)
            .await
    }

    fn run_describe<'a>(
        self: &'a Arc<Self>,
        index: usize,
        rng: &'a Option<Mutex<StdRng>>,
        inherited_before_each: Vec<Hook>,
        inherited_after_each: Vec<Hook>,
        poison: Option<SerializedError>,
    ) -> BoxFuture<'a, Result<(), SerializedError>> {
        async move {
            let (description, ancestry, skip, mut child_describes, mut child_tests, hooks) = {
                let tree = self.tree.lock();
                let node = &tree.describes[index];
                (
                    node.description.clone(),
                    node.ancestry.clone(),
                    node.flags.skip,
                    node.describes.clone(),
                    node.tests.clone(),
                    node.hooks.clone(),
                )
            };

            if skip {
                self.emitter
                    .status(Kind::Describe, Status::Skip, &ancestry, &description);
                return Ok(());
            }

            if let Some(rng) = rng {
                let mut rng = rng.lock();
                child_describes.shuffle(&mut *rng);
                child_tests.shuffle(&mut *rng);
            }

            // Ancestor before-each hooks run first, own hooks after; the
            // after-each direction is the reverse (innermost first).
            let mut before_each = inherited_before_each;
            let mut after_each = Vec::new();
            for hook in &hooks {
                match hook.kind {
                    HookKind::BeforeEach => before_each.push(hook.clone()),
                    HookKind::AfterEach => after_each.push(hook.clone()),
                    HookKind::BeforeAll | HookKind::AfterAll => {}
                }
            }
            after_each.extend(inherited_after_each);

            // A before-all failure poisons every test in the subtree.
            let mut poison = poison;
            if poison.is_none() {
                for hook in hooks.iter().filter(|hook| hook.kind == HookKind::BeforeAll) {
                    if let Err(hook_error) = self.run_hook(hook, HookKind::BeforeAll).await {
                        poison = Some(hook_error);
                        break;
                    }
                }
            }

            for child in child_describes {
                self.run_describe(
                    child,
                    rng,
                    before_each.clone(),
                    after_each.clone(),
                    poison.clone(),
                )
                .await?;
            }
            for test_index in child_tests {
                self.run_test(test_index, &before_each, &after_each, poison.as_ref())
                    .await;
            }

            // An after-all failure is a suite-scope error.
            for hook in hooks.iter().filter(|hook| hook.kind == HookKind::AfterAll) {
                self.run_hook(hook, HookKind::AfterAll).await?;
            }

            Ok(())
        }
        .boxed()
    }

    /// Runs one hook under the suite's default timeout.
    async fn run_hook(&self, hook: &Hook, kind: HookKind) -> Result<(), SerializedError> {
        let timeout_ms = self.context.timeout;
        let handle = tokio::spawn((hook.body)());

        let mut error = match tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await
        {
            Err(_elapsed) => SerializedError::timeout(timeout_ms, Some(hook.location.into())),
            Ok(Err(join_error)) => {
                let message = if join_error.is_panic() {
                    let panic = join_error.into_panic();
                    panic_message(panic.as_ref())
                } else {
                    "hook was aborted".to_owned()
                };
                SerializedError::new("Error", message)
            }
            Ok(Ok(Err(failure))) => failure.error,
            Ok(Ok(Ok(()))) => return Ok(()),
        };

        error
            .extra
            .insert("hook".to_owned(), serde_json::json!(kind.as_str()));
        Err(error)
    }

    async fn run_test(
        &self,
        index: usize,
        before_each: &[Hook],
        after_each: &[Hook],
        poison: Option<&SerializedError>,
    ) {
        let (registration, ancestry, effective_skip, effective_only) = {
            let tree = self.tree.lock();
            let node = &tree.tests[index];
            (
                node.registration.clone(),
                node.ancestry.clone(),
                node.effective_skip,
                node.effective_only,
            )
        };
        let description = registration.description.clone();

        if effective_skip || (self.only_mode() && !effective_only) {
            self.emitter
                .status(Kind::Test, Status::Skip, &ancestry, &description);
            return;
        }

        let Some(body) = registration.body.clone() else {
            self.emitter
                .status(Kind::Test, Status::Todo, &ancestry, &description);
            return;
        };

        self.emitter
            .status(Kind::Test, Status::Start, &ancestry, &description);

        let timeout_ms = registration
            .options
            .timeout
            .map_or(self.context.timeout, |own| own.min(self.context.timeout));
        let location = registration.location;

        let mut errors: Vec<SerializedError> = Vec::new();
        let started = Instant::now();

        if let Some(poison) = poison {
            errors.push(poison.clone());
        } else {
            for hook in before_each {
                if let Err(hook_error) = self.run_hook(hook, HookKind::BeforeEach).await {
                    errors.push(hook_error);
                    break;
                }
            }

            if errors.is_empty() {
                self.executing_test.store(true, Ordering::SeqCst);
                // The body runs as its own task: losing the timeout race
                // leaves it running in the background with its result
                // discarded.
                let handle = tokio::spawn(body(registration.args.clone()));
                let outcome =
                    tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await;
                self.executing_test.store(false, Ordering::SeqCst);

                let body_error = match outcome {
                    Err(_elapsed) => {
                        Some(SerializedError::timeout(timeout_ms, Some(location.into())))
                    }
                    Ok(Err(join_error)) => {
                        let message = if join_error.is_panic() {
                            let panic = join_error.into_panic();
                            panic_message(panic.as_ref())
                        } else {
                            "test body was aborted".to_owned()
                        };
                        Some(SerializedError::new("Error", message))
                    }
                    Ok(Ok(Err(failure))) => Some(failure.error),
                    Ok(Ok(Ok(()))) => None,
                };

                // Expected-to-fail tests invert the body's verdict.
                match (registration.options.failing, body_error) {
                    (false, Some(body_error)) => errors.push(body_error),
                    (true, None) => errors.push(SerializedError::failing(
                        "expected the test to fail, but it passed",
                        Some(location.into()),
                    )),
                    (false, None) | (true, Some(_)) => {}
                }
            }

            // After-each hooks run even when the body failed.
            for hook in after_each {
                if let Err(hook_error) = self.run_hook(hook, HookKind::AfterEach).await {
                    errors.push(hook_error);
                }
            }
        }

        // Test-end hook: restore mocks the body left installed.
        self.mocks.restore_all();

        let duration = duration_ms(started.elapsed());
        let action = if errors.is_empty() {
            Action::Success
        } else {
            Action::Failure
        };
        self.emitter
            .action(Kind::Test, action, &ancestry, &description, &errors, duration, location);
    }
}

fn snapshot_of(tree: &Tree, index: usize) -> DescribeSnapshot {
    let node = &tree.describes[index];
    DescribeSnapshot {
        description: node.description.clone(),
        ancestry: node.ancestry.clone(),
        describes: node
            .describes
            .iter()
            .map(|child| snapshot_of(tree, *child))
            .collect(),
        tests: node
            .tests
            .iter()
            .map(|test| {
                let test = &tree.tests[*test];
                TestSnapshot {
                    description: test.registration.description.clone(),
                    ancestry: test.ancestry.clone(),
                    effective_skip: test.effective_skip,
                    effective_only: test.effective_only,
                }
            })
            .collect(),
    }
}

fn duration_ms(elapsed: Duration) -> u32 {
    elapsed.as_millis().min(u128::from(u32::MAX)) as u32
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "test body panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use kestrel_schema::{decode, Frame, FrameBody};

    use super::*;
    use crate::test::TestFailure;

    struct Captured {
        frames: Arc<Mutex<Vec<Frame>>>,
    }

    fn suite(context: RuntimeContext) -> (Arc<SuiteState>, Captured) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        let dispatch: DispatchFn = Arc::new(move |bytes: &[u8]| {
            sink.lock().push(decode(bytes).expect("suite emits valid frames"));
        });
        let state = SuiteState::new(context, dispatch).unwrap();
        (state, Captured { frames })
    }

    fn passing_test(description: &str) -> TestRegistration {
        TestRegistration::new(description, |_args| async { Ok(()) })
    }

    fn failing_test(description: &str) -> TestRegistration {
        TestRegistration::new(description, |_args| async {
            Err(TestFailure::failing("assertion failed"))
        })
    }

    impl Captured {
        fn bodies(&self) -> Vec<FrameBody> {
            self.frames.lock().iter().map(|f| f.body.clone()).collect()
        }

        fn statuses(&self) -> Vec<(Kind, Status, String)> {
            self.bodies()
                .into_iter()
                .filter_map(|body| match body {
                    FrameBody::Status(status) => {
                        Some((status.kind, status.status, status.description))
                    }
                    _ => None,
                })
                .collect()
        }

        fn actions(&self) -> Vec<(Action, String)> {
            self.bodies()
                .into_iter()
                .filter_map(|body| match body {
                    FrameBody::Action(action) => Some((action.action, action.description)),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn registration_builds_the_expected_tree() {
        let (state, _frames) = suite(RuntimeContext::default());

        state
            .describe("parent", |s| {
                s.describe("child", |s| {
                    s.add_test(passing_test("t"));
                })
                .unwrap();
            })
            .unwrap();

        let root = state.snapshot();
        assert_eq!(root.describes[0].description, "parent");
        assert_eq!(root.describes[0].describes[0].description, "child");
        let test = &root.describes[0].describes[0].tests[0];
        assert_eq!(test.ancestry, vec!["parent".to_owned(), "child".to_owned()]);
        assert!(state.has_tests());
    }

    #[tokio::test]
    async fn successful_run_emits_exactly_one_suite_end() {
        let (state, frames) = suite(RuntimeContext::default());
        state
            .describe("group", |s| s.add_test(passing_test("works")))
            .unwrap();

        state.run().await;

        let statuses = frames.statuses();
        let ends: Vec<_> = statuses
            .iter()
            .filter(|(kind, status, _)| *kind == Kind::Suite && *status == Status::End)
            .collect();
        assert_eq!(ends.len(), 1);
        assert_eq!(ends[0].2, "");
        assert_eq!(frames.actions(), vec![(Action::Success, "works".to_owned())]);
    }

    #[tokio::test]
    async fn empty_suite_emits_error_and_no_end() {
        let (state, frames) = suite(RuntimeContext {
            relative_path: "src/empty.spec.ts".into(),
            ..RuntimeContext::default()
        });

        state.run().await;

        let bodies = frames.bodies();
        assert_eq!(bodies.len(), 1);
        let FrameBody::Error(error) = &bodies[0] else {
            panic!("expected an error frame");
        };
        let decoded = SerializedError::from_json(&error.error).unwrap();
        assert_eq!(decoded.name, "EmptySuite");
    }

    #[tokio::test]
    async fn failures_carry_serialized_errors() {
        let (state, frames) = suite(RuntimeContext::default());
        state
            .describe("group", |s| s.add_test(failing_test("breaks")))
            .unwrap();

        state.run().await;

        let bodies = frames.bodies();
        let action = bodies
            .iter()
            .find_map(|body| match body {
                FrameBody::Action(action) => Some(action.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(action.action, Action::Failure);
        let errors: Vec<SerializedError> = serde_json::from_str(&action.errors).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "Failing");
        assert!(errors[0].location.is_some());
    }

    #[tokio::test]
    async fn skip_flags_short_circuit() {
        let (state, frames) = suite(RuntimeContext::default());
        state
            .describe_skip("skipped group", |s| {
                s.add_test(passing_test("never runs"));
            })
            .unwrap();
        state
            .describe("live group", |s| {
                s.add_test(passing_test("runs"));
                s.add_test(passing_test("skipped test").skip());
            })
            .unwrap();

        state.run().await;

        let statuses = frames.statuses();
        assert!(statuses.contains(&(
            Kind::Describe,
            Status::Skip,
            "skipped group".to_owned()
        )));
        assert!(statuses.contains(&(Kind::Test, Status::Skip, "skipped test".to_owned())));
        assert_eq!(frames.actions().len(), 1);
    }

    #[tokio::test]
    async fn only_mode_latches_and_skips_everything_else() {
        let (state, frames) = suite(RuntimeContext::default());
        state
            .describe("group", |s| {
                s.add_test(passing_test("ordinary"));
                s.add_test(passing_test("focused").only());
            })
            .unwrap();

        assert!(state.only_mode());
        state.run().await;

        let statuses = frames.statuses();
        assert!(statuses.contains(&(Kind::Test, Status::Skip, "ordinary".to_owned())));
        assert_eq!(
            frames.actions(),
            vec![(Action::Success, "focused".to_owned())]
        );
    }

    #[tokio::test]
    async fn filter_match_focuses_tests() {
        let (state, frames) = suite(RuntimeContext {
            filter: vec!["Login".to_owned(), "accepts .*".to_owned()],
            ..RuntimeContext::default()
        });
        state
            .describe("Login", |s| {
                s.add_test(passing_test("accepts valid credentials"));
                s.add_test(passing_test("logs a banner"));
            })
            .unwrap();

        assert!(state.only_mode());
        state.run().await;

        assert_eq!(
            frames.actions(),
            vec![(Action::Success, "accepts valid credentials".to_owned())]
        );
    }

    #[tokio::test]
    async fn todo_tests_emit_todo_status() {
        let (state, frames) = suite(RuntimeContext::default());
        state
            .describe("group", |s| {
                s.add_test(TestRegistration::todo("wire retry logic"));
                s.add_test(passing_test("done"));
            })
            .unwrap();

        state.run().await;

        assert!(frames.statuses().contains(&(
            Kind::Test,
            Status::Todo,
            "wire retry logic".to_owned()
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_bodies_lose_the_timeout_race() {
        let (state, frames) = suite(RuntimeContext {
            timeout: 10_000,
            ..RuntimeContext::default()
        });
        state
            .describe("group", |s| {
                s.add_test(
                    TestRegistration::new("sleeps forever", |_args| async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(())
                    })
                    .timeout(50),
                );
            })
            .unwrap();

        state.run().await;

        let bodies = frames.bodies();
        let action = bodies
            .iter()
            .find_map(|body| match body {
                FrameBody::Action(action) => Some(action.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(action.action, Action::Failure);
        let errors: Vec<SerializedError> = serde_json::from_str(&action.errors).unwrap();
        assert_eq!(errors[0].name, "Timeout");
        assert_eq!(errors[0].message, "Exceeded timeout of 50 ms");
    }

    #[tokio::test]
    async fn nested_describe_inside_a_test_is_rejected() {
        let (state, frames) = suite(RuntimeContext::default());
        let for_body = Arc::clone(&state);
        state
            .describe("group", move |s| {
                let inner = Arc::clone(&for_body);
                s.add_test(TestRegistration::new("misbehaves", move |_args| {
                    let inner = Arc::clone(&inner);
                    async move {
                        let result = inner.describe("late", |_| {});
                        assert!(matches!(result, Err(SuiteError::NestedDescribeInTest)));
                        Ok(())
                    }
                }));
            })
            .unwrap();

        state.run().await;
        assert_eq!(frames.actions().len(), 1);
    }

    #[tokio::test]
    async fn randomize_is_deterministic_under_a_seed() {
        let run_with_seed = |seed: u64| async move {
            let (state, frames) = suite(RuntimeContext {
                randomize: true,
                seed: Some(seed),
                ..RuntimeContext::default()
            });
            state
                .describe("group", |s| {
                    for name in ["a", "b", "c", "d", "e"] {
                        s.add_test(passing_test(name));
                    }
                })
                .unwrap();
            state.run().await;
            frames
                .actions()
                .into_iter()
                .map(|(_, description)| description)
                .collect::<Vec<_>>()
        };

        let first = run_with_seed(7).await;
        let second = run_with_seed(7).await;
        assert_eq!(first, second);

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c", "d", "e"]);

        let mut reordered = false;
        for seed in 0..20 {
            if run_with_seed(seed).await != first {
                reordered = true;
                break;
            }
        }
        assert!(reordered, "some seed should produce a different order");
    }

    #[tokio::test]
    async fn failing_tests_invert_their_verdict() {
        let (state, frames) = suite(RuntimeContext::default());
        state
            .describe("group", |s| {
                s.add_test(failing_test("fails as promised").failing());
                s.add_test(passing_test("passes unexpectedly").failing());
            })
            .unwrap();

        state.run().await;

        let actions = frames.actions();
        assert!(actions.contains(&(Action::Success, "fails as promised".to_owned())));
        assert!(actions.contains(&(Action::Failure, "passes unexpectedly".to_owned())));
    }

    #[tokio::test]
    async fn describe_each_expands_groups() {
        let (state, frames) = suite(RuntimeContext::default());
        let cases = crate::each::value_cases(vec![
            serde_json::json!("alpha"),
            serde_json::json!("beta"),
        ]);

        state
            .describe_each(&cases, "module %s", |s, _args| {
                s.add_test(passing_test("loads"));
            })
            .unwrap();

        let root = state.snapshot();
        assert_eq!(root.describes.len(), 2);
        assert_eq!(root.describes[0].description, "module alpha");
        assert_eq!(root.describes[1].description, "module beta");

        state.run().await;
        assert_eq!(frames.actions().len(), 2);
    }

    #[tokio::test]
    async fn hooks_run_in_nesting_order() {
        let (state, frames) = suite(RuntimeContext::default());
        let trail: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let push = |label: &'static str| {
            let trail = Arc::clone(&trail);
            move || {
                let trail = Arc::clone(&trail);
                async move {
                    trail.lock().push(label);
                    Ok(())
                }
            }
        };

        state
            .describe("outer", |s| {
                s.before_all(push("outer beforeAll"));
                s.before_each(push("outer beforeEach"));
                s.after_each(push("outer afterEach"));
                s.after_all(push("outer afterAll"));
                s.describe("inner", |s| {
                    s.before_each(push("inner beforeEach"));
                    s.after_each(push("inner afterEach"));
                    s.add_test(passing_test("t"));
                })
                .unwrap();
            })
            .unwrap();

        state.run().await;

        assert_eq!(
            *trail.lock(),
            vec![
                "outer beforeAll",
                "outer beforeEach",
                "inner beforeEach",
                "inner afterEach",
                "outer afterEach",
                "outer afterAll",
            ]
        );
        assert_eq!(frames.actions(), vec![(Action::Success, "t".to_owned())]);
    }

    #[tokio::test]
    async fn before_all_failure_poisons_the_subtree() {
        let (state, frames) = suite(RuntimeContext::default());
        state
            .describe("group", |s| {
                s.before_all(|| async { Err(TestFailure::failing("setup exploded")) });
                s.add_test(passing_test("first"));
                s.add_test(passing_test("second"));
            })
            .unwrap();

        state.run().await;

        let actions = frames.actions();
        assert_eq!(actions.len(), 2);
        assert!(actions
            .iter()
            .all(|(action, _)| *action == Action::Failure));

        // The suite itself still ends: poisoning is test-level.
        assert!(frames
            .statuses()
            .contains(&(Kind::Suite, Status::End, String::new())));
    }

    #[tokio::test]
    async fn failing_after_each_fails_the_test() {
        let (state, frames) = suite(RuntimeContext::default());
        state
            .describe("group", |s| {
                s.after_each(|| async { Err(TestFailure::failing("teardown exploded")) });
                s.add_test(passing_test("t"));
            })
            .unwrap();

        state.run().await;

        let bodies = frames.bodies();
        let action = bodies
            .iter()
            .find_map(|body| match body {
                FrameBody::Action(action) => Some(action.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(action.action, Action::Failure);
        let errors: Vec<SerializedError> = serde_json::from_str(&action.errors).unwrap();
        assert_eq!(errors[0].extra["hook"], "afterEach");
    }

    #[tokio::test]
    async fn failing_after_all_is_a_suite_error() {
        let (state, frames) = suite(RuntimeContext::default());
        state
            .describe("group", |s| {
                s.after_all(|| async { Err(TestFailure::failing("global teardown exploded")) });
                s.add_test(passing_test("t"));
            })
            .unwrap();

        state.run().await;

        // The test itself passed, but the suite settles with an error and
        // no END frame.
        assert_eq!(frames.actions(), vec![(Action::Success, "t".to_owned())]);
        assert!(!frames
            .statuses()
            .contains(&(Kind::Suite, Status::End, String::new())));
        let error_frame = frames
            .bodies()
            .into_iter()
            .find_map(|body| match body {
                FrameBody::Error(error) => Some(error),
                _ => None,
            })
            .unwrap();
        let decoded = SerializedError::from_json(&error_frame.error).unwrap();
        assert_eq!(decoded.extra["hook"], "afterAll");
    }

    #[tokio::test]
    async fn test_each_expands_cases() {
        let (state, frames) = suite(RuntimeContext::default());
        let cases = crate::each::table_cases(
            "a|b|expected",
            vec![
                vec![serde_json::json!(1), serde_json::json!(2), serde_json::json!(3)],
                vec![serde_json::json!(2), serde_json::json!(2), serde_json::json!(4)],
            ],
        );

        state
            .describe("math", |s| {
                s.test_each(
                    &cases,
                    "adds $a and $b",
                    &TestRegistration::new("", |args| async move {
                        let record = args[0].as_object().expect("table case record");
                        let sum = record["a"].as_i64().unwrap() + record["b"].as_i64().unwrap();
                        if sum == record["expected"].as_i64().unwrap() {
                            Ok(())
                        } else {
                            Err(TestFailure::failing("bad sum"))
                        }
                    }),
                );
            })
            .unwrap();

        state.run().await;

        assert_eq!(
            frames.actions(),
            vec![
                (Action::Success, "adds 1 and 2".to_owned()),
                (Action::Success, "adds 2 and 2".to_owned())
            ]
        );
    }
}
