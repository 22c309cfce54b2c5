//! The executable-bundle contract produced by the external transpiler.

use std::sync::Arc;

use kestrel_schema::SerializedError;
use kestrel_source_map::SourceMapData;

use crate::sandbox::Sandbox;

/// A single-file bundle, ready to evaluate inside a sandbox.
///
/// Evaluation registers the suite's describes and tests against the
/// sandbox; it must not run them. Errors returned (or panics raised) here
/// are wrapped into a source-mapped ERROR frame by the sandbox host.
pub trait SuiteProgram: Send + Sync {
    fn evaluate(&self, sandbox: &Sandbox) -> Result<(), SerializedError>;
}

impl<F> SuiteProgram for F
where
    F: Fn(&Sandbox) -> Result<(), SerializedError> + Send + Sync,
{
    fn evaluate(&self, sandbox: &Sandbox) -> Result<(), SerializedError> {
        self(sandbox)
    }
}

/// What the transpiler hands the coordinator for one spec file.
#[derive(Clone)]
pub struct TranspiledSuite {
    /// The executable bundle.
    pub program: Arc<dyn SuiteProgram>,
    /// The decoded source map attached to the bundle.
    pub source_map: SourceMapData,
}

impl TranspiledSuite {
    pub fn new(program: impl SuiteProgram + 'static, source_map: SourceMapData) -> Self {
        Self {
            program: Arc::new(program),
            source_map,
        }
    }
}
