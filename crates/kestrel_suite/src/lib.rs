//! In-sandbox suite registration and execution.
//!
//! Each sandbox owns one [`SuiteState`]: bundles register nested describe
//! blocks and tests against it, then the sandbox host runs the tree. Every
//! observable step (start/end/skip/todo, per-test results, logs, suite
//! errors) leaves the sandbox as a wire frame through the injected
//! dispatch callback.

mod context;
mod each;
mod emit;
mod error;
pub mod expect;
mod filter;
mod hooks;
mod logger;
mod state;

pub use context::RuntimeContext;
pub use each::{format_case_description, table_cases, value_cases, EachCase};
pub use emit::{DispatchFn, FrameEmitter};
pub use error::SuiteError;
pub use filter::FilterChain;
pub use hooks::{Hook, HookBody, HookKind};
pub use logger::{LogLevel, SuiteLogger};
pub use state::{DescribeFlags, DescribeSnapshot, SuiteState, TestSnapshot};
pub use test::{TestBody, TestFailure, TestOptions, TestRegistration};
