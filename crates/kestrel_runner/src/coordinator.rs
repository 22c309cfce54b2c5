//! The coordinator: scheduling, frame dispatch, and suite lifecycles.

use std::{
    collections::{BTreeMap, HashMap},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use eyre::WrapErr;
use kestrel_queue::{QueueError, WorkQueue};
use kestrel_schema::{decode, FrameBody, Kind, SchemaError, Status};
use kestrel_source_map::{SourceMapError, SourceMapIndex};
use kestrel_suite::{DispatchFn, RuntimeContext};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::oneshot;

use crate::{
    bundle::TranspiledSuite,
    config::{ConfigError, RunnerConfig},
    events::{ActionMessage, ErrorMessage, Listeners, LogMessage, StatusMessage},
    handler::MessageHandler,
    ident,
    result::{RunOutcome, SuiteOutcome, SuiteStatus, SuiteTally},
    sandbox,
};

/// Errors surfaced by [`TestCoordinator::dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The frame did not decode (includes the invalid-schema-type kind).
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The frame names a suite id with no registered source map.
    #[error("no runner registered for suite id '{suite_id}'")]
    UnregisteredRunner {
        /// The offending id, padding stripped.
        suite_id: String,
    },
}

/// How a single suite's execution settled, as seen by the scheduler.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SuiteRunError {
    /// The suite emitted an ERROR frame (or never reached its END).
    #[error("suite reported an error")]
    Failed,

    /// A bail cancellation cleared the suite before it started.
    #[error("suite was cancelled before it could run")]
    Cancelled,
}

struct SuiteEntry {
    rel_path: String,
    map: Arc<SourceMapIndex>,
    tally: Mutex<SuiteTally>,
}

struct Shared {
    project_root: PathBuf,
    config: RunnerConfig,
    runner_id: String,
    queue: WorkQueue<Result<(), SuiteRunError>>,
    /// Source maps and tallies keyed by suite id.
    suites: Mutex<HashMap<String, Arc<SuiteEntry>>>,
    /// Completion channels of suites currently considered running.
    running: Mutex<HashMap<String, oneshot::Sender<Result<(), SuiteRunError>>>>,
    /// Human names by runner id.
    runners: Mutex<HashMap<String, String>>,
    listeners: Listeners,
    handler: MessageHandler,
}

/// Owns the queue, the suite tables, and the reporter listeners; decodes
/// every frame coming back from a sandbox and routes it.
pub struct TestCoordinator {
    shared: Arc<Shared>,
}

impl TestCoordinator {
    /// Creates a coordinator over a validated configuration.
    pub fn new(project_root: impl Into<PathBuf>, config: RunnerConfig) -> Result<Self, ConfigError> {
        Self::with_handler(project_root, config, MessageHandler::default())
    }

    /// Like [`TestCoordinator::new`] with a custom message handler (stack
    /// options, snippet formatter).
    pub fn with_handler(
        project_root: impl Into<PathBuf>,
        config: RunnerConfig,
        handler: MessageHandler,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let parallel: NonZeroUsize = config.parallel()?;

        let project_root = project_root.into();
        let project_root = dunce::canonicalize(&project_root).unwrap_or(project_root);

        let runner_id = ident::generate_id();
        let mut runners = HashMap::new();
        runners.insert(runner_id.clone(), "local".to_owned());

        Ok(Self {
            shared: Arc::new(Shared {
                project_root,
                config,
                runner_id,
                queue: WorkQueue::new(parallel),
                suites: Mutex::new(HashMap::new()),
                running: Mutex::new(HashMap::new()),
                runners: Mutex::new(runners),
                listeners: Listeners::default(),
                handler,
            }),
        })
    }

    /// The local runner's id, stamped into every frame header.
    pub fn runner_id(&self) -> &str {
        &self.shared.runner_id
    }

    /// Registers a runner name for reporter lookups (external dispatch mode
    /// attaches its runners here).
    pub fn register_runner(&self, runner_id: &str, name: &str) {
        self.shared
            .runners
            .lock()
            .insert(runner_id.to_owned(), name.to_owned());
    }

    /// Queued plus running sandbox count.
    pub fn queue_size(&self) -> usize {
        self.shared.queue.size()
    }

    // Reporter subscriptions.

    pub fn on_log(&self, listener: impl Fn(&LogMessage) + Send + Sync + 'static) {
        self.shared.listeners.on_log(Arc::new(listener));
    }

    pub fn on_status(&self, listener: impl Fn(&StatusMessage) + Send + Sync + 'static) {
        self.shared.listeners.on_status(Arc::new(listener));
    }

    pub fn on_action(&self, listener: impl Fn(&ActionMessage) + Send + Sync + 'static) {
        self.shared.listeners.on_action(Arc::new(listener));
    }

    pub fn on_error(&self, listener: impl Fn(&ErrorMessage) + Send + Sync + 'static) {
        self.shared.listeners.on_error(Arc::new(listener));
    }

    /// Walks the project root with the configured patterns.
    pub fn discover(&self) -> Result<BTreeMap<PathBuf, PathBuf>, ConfigError> {
        let patterns = self.shared.config.pattern_set()?;
        Ok(kestrel_discovery::discover(
            &self.shared.project_root,
            &patterns,
        ))
    }

    /// The full local pipeline: discover spec files, run each through the
    /// external transpiler, execute the bundles.
    pub async fn run_project<F>(&self, transpile: F, watch: bool) -> eyre::Result<RunOutcome>
    where
        F: Fn(&Path) -> eyre::Result<TranspiledSuite>,
    {
        let discovered = self.discover()?;
        debug!(count = discovered.len(), "discovered spec files");

        let mut files = BTreeMap::new();
        for (rel_path, abs_path) in discovered {
            let suite = transpile(&abs_path)
                .wrap_err_with(|| format!("failed to transpile '{}'", rel_path.display()))?;
            files.insert(abs_path, suite);
        }

        Ok(self.execute_suites(files, watch).await)
    }

    /// Decodes one frame and routes it; the entry point bound into every
    /// sandbox's `dispatch` callback.
    pub fn dispatch(&self, bytes: &[u8]) -> Result<(), CoordinatorError> {
        self.shared.dispatch(bytes)
    }

    /// Settles a running suite exactly once; absent entries are a no-op.
    pub fn complete_suite(&self, suite_id: &str, had_error: bool) {
        self.shared.complete_suite(suite_id, had_error);
    }

    /// Executes every transpiled suite, at most `parallel` at a time, and
    /// aggregates the settled outcomes.
    ///
    /// One failing suite does not keep the others from running unless
    /// `bail` is set, in which case the first error frame stops the queue
    /// and rejects everything still waiting. With `watch`, source-map
    /// registrations outlive the run for an external re-run driver.
    pub async fn execute_suites(
        &self,
        files: BTreeMap<PathBuf, TranspiledSuite>,
        watch: bool,
    ) -> RunOutcome {
        let shared = &self.shared;
        let started = Instant::now();

        let seed = shared.config.randomize.then(|| {
            shared
                .config
                .seed
                .unwrap_or_else(|| rand::rng().random::<u64>())
        });

        let mut outcome = RunOutcome {
            seed,
            ..RunOutcome::default()
        };
        let mut pending = Vec::new();

        for (abs_path, suite) in files {
            let rel_path = rel_path(&shared.project_root, &abs_path);

            let map = match SourceMapIndex::new(suite.source_map.clone(), abs_path) {
                Ok(map) => Arc::new(map),
                Err(load_error) => {
                    warn!(suite = %rel_path, %load_error, "source map failed to load");
                    outcome.suites.insert(
                        rel_path.clone(),
                        SuiteOutcome {
                            suite_id: String::new(),
                            rel_path,
                            status: SuiteStatus::Failed,
                            tally: SuiteTally::default(),
                            error: Some(source_map_error_text(&load_error)),
                        },
                    );
                    continue;
                }
            };

            let suite_id = ident::generate_id();
            trace!(suite = %rel_path, %suite_id, "registering suite");

            shared.suites.lock().insert(
                suite_id.clone(),
                Arc::new(SuiteEntry {
                    rel_path: rel_path.clone(),
                    map,
                    tally: Mutex::new(SuiteTally::default()),
                }),
            );

            let (sender, receiver) = oneshot::channel();
            shared.running.lock().insert(suite_id.clone(), sender);

            let task = {
                let shared = Arc::clone(shared);
                let program = Arc::clone(&suite.program);
                let context = RuntimeContext {
                    bail: shared.config.bail,
                    filter: shared.config.filter.clone(),
                    timeout: shared.config.timeout,
                    randomize: shared.config.randomize,
                    suite_id: suite_id.clone(),
                    runner_id: shared.runner_id.clone(),
                    relative_path: rel_path.clone(),
                    seed,
                };
                async move {
                    let dispatch: DispatchFn = {
                        let shared = Arc::clone(&shared);
                        Arc::new(move |bytes: &[u8]| {
                            if let Err(dispatch_error) = shared.dispatch(bytes) {
                                warn!(%dispatch_error, "dropping undeliverable frame");
                            }
                        })
                    };

                    sandbox::run_sandbox(context, dispatch, program).await;

                    // The suite has settled its entry by now (END or ERROR);
                    // a dropped sender means the bookkeeping was torn down
                    // without a settle, which counts as a failure.
                    match receiver.await {
                        Ok(result) => result,
                        Err(_) => Err(SuiteRunError::Failed),
                    }
                }
            };

            let enqueued = shared.queue.enqueue(task, Some(&rel_path));
            pending.push((suite_id, rel_path, enqueued));
        }

        shared.queue.start();

        for (suite_id, rel_path, enqueued) in pending {
            let settled = match enqueued.await {
                Ok(Ok(())) => (SuiteStatus::Passed, None),
                Ok(Err(suite_error)) => (SuiteStatus::Failed, Some(suite_error.to_string())),
                Err(QueueError::Cancelled) => (
                    SuiteStatus::Cancelled,
                    Some(SuiteRunError::Cancelled.to_string()),
                ),
                Err(queue_error @ QueueError::Closed) => {
                    (SuiteStatus::Failed, Some(queue_error.to_string()))
                }
            };

            // Cancelled suites never dispatched anything; drop their stale
            // completion entries.
            shared.running.lock().remove(&suite_id);

            let tally = shared
                .suites
                .lock()
                .get(&suite_id)
                .map(|entry| *entry.tally.lock())
                .unwrap_or_default();

            if !watch {
                shared.suites.lock().remove(&suite_id);
            }

            outcome.suites.insert(
                rel_path.clone(),
                SuiteOutcome {
                    suite_id,
                    rel_path,
                    status: settled.0,
                    tally,
                    error: settled.1,
                },
            );
        }

        outcome.duration = started.elapsed();
        debug!(
            suites = outcome.suites.len(),
            ?outcome.duration,
            "executed all suites"
        );
        outcome
    }
}

impl Shared {
    fn dispatch(&self, bytes: &[u8]) -> Result<(), CoordinatorError> {
        let frame = decode(bytes)?;

        let entry = self
            .suites
            .lock()
            .get(&frame.suite_id)
            .cloned()
            .ok_or_else(|| CoordinatorError::UnregisteredRunner {
                suite_id: frame.trimmed_suite_id().to_owned(),
            })?;

        let runner_name = self
            .runners
            .lock()
            .get(frame.trimmed_runner_id())
            .cloned()
            .unwrap_or_else(|| frame.trimmed_runner_id().to_owned());

        match &frame.body {
            FrameBody::Log(body) => {
                let message =
                    self.handler
                        .log_message(body, &entry.rel_path, &runner_name, &entry.map);
                self.listeners.emit_log(&message);
            }
            FrameBody::Status(body) => {
                if body.kind == Kind::Test {
                    let mut tally = entry.tally.lock();
                    match body.status {
                        Status::Skip => tally.skipped += 1,
                        Status::Todo => tally.todo += 1,
                        Status::Start | Status::End => {}
                    }
                }

                let message =
                    self.handler
                        .status_message(body, &entry.rel_path, &runner_name, &entry.map);
                self.listeners.emit_status(&message);

                if body.kind == Kind::Suite && body.status == Status::End {
                    self.complete_suite(&frame.suite_id, false);
                }
            }
            FrameBody::Action(body) => {
                {
                    let mut tally = entry.tally.lock();
                    match body.action {
                        kestrel_schema::Action::Success => tally.passed += 1,
                        kestrel_schema::Action::Failure => tally.failed += 1,
                    }
                }

                let message =
                    self.handler
                        .action_message(body, &entry.rel_path, &runner_name, &entry.map);
                self.listeners.emit_action(&message);
            }
            FrameBody::Error(body) => {
                // Settle first so a bail cancellation is already in motion
                // when the reporter sees the error.
                self.complete_suite(&frame.suite_id, true);

                let message =
                    self.handler
                        .error_message(body, &entry.rel_path, &runner_name, &entry.map);
                self.listeners.emit_error(&message);
            }
        }

        Ok(())
    }

    fn complete_suite(&self, suite_id: &str, had_error: bool) {
        let Some(sender) = self.running.lock().remove(suite_id) else {
            return;
        };

        if had_error {
            if self.config.bail {
                debug!(%suite_id, "bail: stopping and clearing the queue");
                self.queue.stop();
                self.queue.clear();
            }
            let _ = sender.send(Err(SuiteRunError::Failed));
        } else {
            let _ = sender.send(Ok(()));
        }
    }
}

fn rel_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let text = rel.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

fn source_map_error_text(load_error: &SourceMapError) -> String {
    format!("{}: {load_error}", load_error.kind())
}
