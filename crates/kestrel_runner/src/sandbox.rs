//! Per-suite isolated execution.

use std::sync::Arc;

use kestrel_mock::MockRegistry;
use kestrel_schema::SerializedError;
use kestrel_suite::{DispatchFn, FrameEmitter, RuntimeContext, SuiteLogger, SuiteState};

use crate::bundle::SuiteProgram;

/// The surface a bundle sees while evaluating.
///
/// Everything injected into the execution context lives here: the immutable
/// runtime record, the suite registration handle, the mock registry, the
/// logger, and (indirectly, through the suite) the dispatch binding.
pub struct Sandbox {
    state: Arc<SuiteState>,
    logger: SuiteLogger,
}

impl Sandbox {
    pub(crate) fn new(state: Arc<SuiteState>) -> Self {
        let logger = state.logger();
        Self { state, logger }
    }

    /// The suite registration handle.
    pub fn suite(&self) -> &Arc<SuiteState> {
        &self.state
    }

    /// The injected runtime context.
    pub fn runtime(&self) -> &RuntimeContext {
        self.state.context()
    }

    /// The sandbox console.
    pub fn logger(&self) -> &SuiteLogger {
        &self.logger
    }

    /// The sandbox's mock registry.
    pub fn mocks(&self) -> &MockRegistry {
        self.state.mocks()
    }
}

/// Evaluates a bundle and runs the registered suite.
///
/// Every outcome leaves through the dispatch binding: evaluation errors and
/// panics become ERROR frames, a clean evaluation hands over to the suite
/// runner (which emits END or its own ERROR).
pub(crate) async fn run_sandbox(
    context: RuntimeContext,
    dispatch: DispatchFn,
    program: Arc<dyn SuiteProgram>,
) {
    let suite_id = context.suite_id.clone();
    let runner_id = context.runner_id.clone();
    let emitter = FrameEmitter::new(Arc::clone(&dispatch), &suite_id, &runner_id);

    let state = match SuiteState::new(context, dispatch) {
        Ok(state) => state,
        Err(suite_error) => {
            emitter.error(&suite_error.to_serialized());
            return;
        }
    };

    let sandbox = Sandbox::new(Arc::clone(&state));
    let evaluated = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        program.evaluate(&sandbox)
    }));

    match evaluated {
        Ok(Ok(())) => state.run().await,
        Ok(Err(error)) => {
            debug!(suite = %suite_id, "bundle evaluation failed");
            emitter.error(&error);
        }
        Err(panic) => {
            let message = if let Some(text) = panic.downcast_ref::<&str>() {
                (*text).to_owned()
            } else if let Some(text) = panic.downcast_ref::<String>() {
                text.clone()
            } else {
                "bundle evaluation panicked".to_owned()
            };
            debug!(suite = %suite_id, "bundle evaluation panicked");
            emitter.error(&SerializedError::new("Error", message));
        }
    }
}
