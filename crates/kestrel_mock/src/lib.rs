//! Mock and spy engine.
//!
//! Mocks live in a small dynamic value world ([`Value`], shared mutable
//! objects with descriptor-based property tables) so that suites can replace
//! methods, track invocations, and restore everything when a test finishes.
//! A mock is callable and constructible; both dispatch paths share one
//! tracked state. Installation is descriptor-aware: data properties holding
//! callables are swapped for tracking wrappers, accessor properties get a
//! single mock serving both getter and setter.

mod error;
mod install;
mod mock_fn;
mod registry;
mod value;

pub use error::MockError;
pub use install::{mock_method, mock_function, spy_on, GlobalScope};
pub use mock_fn::{MockFn, MockResult, RestoreThunk};
pub use registry::MockRegistry;
pub use value::{
    CallContext, Callable, CallableKind, ObjectRef, Outcome, PromiseValue, PropertyDescriptor,
    PropertyKind, Value,
};
