//! The coordinator side of the engine.
//!
//! [`TestCoordinator`] owns the bounded work queue, the suite and
//! running-suite tables, and the reporter event listeners. For every
//! discovered spec file it builds a sandbox around the transpiled bundle,
//! injects the runtime context and the `dispatch` binding, and decodes the
//! frames streaming back until the suite settles.

#[macro_use]
extern crate tracing;

mod bundle;
mod config;
mod coordinator;
mod events;
mod handler;
mod ident;
pub mod result;
mod sandbox;
mod stack_trace;

pub use bundle::{SuiteProgram, TranspiledSuite};
pub use config::{ConfigError, RunnerConfig, RunnerEndpoint};
pub use coordinator::{CoordinatorError, SuiteRunError, TestCoordinator};
pub use events::{ActionMessage, ErrorMessage, LogMessage, ResolvedLocation, StatusMessage};
pub use handler::MessageHandler;
pub use ident::generate_id;
pub use result::{RunOutcome, SuiteOutcome, SuiteStatus, SuiteTally};
pub use sandbox::Sandbox;
pub use stack_trace::{
    enrich, EnrichedError, PlainSnippetFormatter, SnippetFormatter, StackTraceOptions,
};
