//! Per-sandbox mock bookkeeping.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    mock_fn::{MockFn, MockState, RestoreThunk},
    value::{Callable, CallableKind},
};

/// The list of live mocks inside one sandbox.
///
/// Every constructed or installed mock registers itself here so the suite
/// runner's test-end hook can restore survivors a test forgot about.
#[derive(Clone, Default)]
pub struct MockRegistry {
    mocks: Arc<Mutex<Vec<Arc<MockState>>>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a free-standing mock, optionally wrapping an
    /// implementation, carrying a restore thunk, and named for diagnostics.
    pub fn mock_fn(
        &self,
        implementation: Option<Callable>,
        restore: Option<RestoreThunk>,
        name: Option<&str>,
    ) -> MockFn {
        let kind = implementation
            .as_ref()
            .map_or(CallableKind::Function, Callable::kind);
        let name = name
            .map(str::to_owned)
            .or_else(|| {
                implementation
                    .as_ref()
                    .map(|implementation| implementation.name().to_owned())
            })
            .unwrap_or_else(|| "kestrel.fn()".to_owned());

        let state = Arc::new(MockState::new(name, implementation, restore));
        self.mocks.lock().push(Arc::clone(&state));
        MockFn::with_state(state, kind, self.clone())
    }

    pub(crate) fn adopt(&self, state: Arc<MockState>) {
        self.mocks.lock().push(state);
    }

    pub(crate) fn unregister(&self, state: &Arc<MockState>) {
        self.mocks
            .lock()
            .retain(|candidate| !Arc::ptr_eq(candidate, state));
    }

    /// Number of live mocks.
    pub fn len(&self) -> usize {
        self.mocks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mocks.lock().is_empty()
    }

    /// Restores every surviving mock and empties the registry.
    pub fn restore_all(&self) {
        let drained: Vec<Arc<MockState>> = std::mem::take(&mut *self.mocks.lock());
        for state in drained {
            if let Some(restore) = state.take_restore() {
                restore();
            }
        }
    }

    /// Empties every mock's tracking arrays.
    pub fn clear_all(&self) {
        for state in self.mocks.lock().iter() {
            state.clear();
        }
    }

    /// Clears tracking and drops queued implementations on every mock.
    pub fn reset_all(&self) {
        for state in self.mocks.lock().iter() {
            state.reset();
        }
    }
}
