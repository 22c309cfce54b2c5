//! Tracked mock state and its public handle.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{
    registry::MockRegistry,
    value::{Callable, CallableKind, ObjectRef, Value},
};

/// Reinstalls whatever a mock displaced.
pub type RestoreThunk = Box<dyn FnOnce() + Send>;

/// One entry of a mock's `results` list.
///
/// `Incomplete` is only observable from within the corresponding
/// invocation's body; it is replaced before the invocation returns.
#[derive(Clone, Debug, PartialEq)]
pub enum MockResult {
    Return(Value),
    Throw(Value),
    Incomplete,
}

#[derive(Default)]
struct Tracking {
    calls: Vec<Vec<Value>>,
    contexts: Vec<Value>,
    instances: Vec<Value>,
    invocation_call_order: Vec<u64>,
    results: Vec<MockResult>,
    next_order: u64,
}

impl Tracking {
    fn record_entry(&mut self, args: Vec<Value>, context: Value) -> usize {
        let index = self.calls.len();
        self.calls.push(args);
        self.contexts.push(context);
        self.next_order += 1;
        self.invocation_call_order.push(self.next_order);
        self.results.push(MockResult::Incomplete);
        index
    }
}

#[derive(Default)]
struct Implementations {
    default: Option<Callable>,
    once_queue: VecDeque<Callable>,
}

/// Shared state behind a mock's call and construct dispatch paths.
pub struct MockState {
    name: Mutex<String>,
    tracking: Mutex<Tracking>,
    implementations: Mutex<Implementations>,
    restore: Mutex<Option<RestoreThunk>>,
}

impl MockState {
    pub(crate) fn new(
        name: String,
        implementation: Option<Callable>,
        restore: Option<RestoreThunk>,
    ) -> Self {
        Self {
            name: Mutex::new(name),
            tracking: Mutex::new(Tracking::default()),
            implementations: Mutex::new(Implementations {
                default: implementation,
                once_queue: VecDeque::new(),
            }),
            restore: Mutex::new(restore),
        }
    }

    /// Pops the front of the once-queue, falling back to the default.
    fn select_implementation(&self) -> Option<Callable> {
        let mut implementations = self.implementations.lock();
        implementations
            .once_queue
            .pop_front()
            .or_else(|| implementations.default.clone())
    }

    /// The function dispatch path.
    ///
    /// A thrown value is recorded as a `Throw` result and then *returned* as
    /// the call's value, keeping instrumentation alive across failures.
    pub fn invoke(&self, this: Value, args: Vec<Value>) -> Value {
        let selected = self.select_implementation();

        // A bound implementation contributes its receiver and leading args
        // to what gets recorded.
        let (implementation, this, args) = match selected {
            Some(implementation) => {
                let (target, binding) = implementation.unwrap_bound();
                match binding {
                    Some((bound_this, mut bound_args)) => {
                        bound_args.extend(args);
                        (Some(target), bound_this, bound_args)
                    }
                    None => (Some(target), this, args),
                }
            }
            None => (None, this, args),
        };

        let index = self
            .tracking
            .lock()
            .record_entry(args.clone(), this.clone());

        let outcome = match implementation {
            Some(implementation) => implementation.call(this, args),
            None => Ok(Value::Undefined),
        };

        let mut tracking = self.tracking.lock();
        match outcome {
            Ok(value) => {
                tracking.results[index] = MockResult::Return(value.clone());
                value
            }
            Err(thrown) => {
                tracking.results[index] = MockResult::Throw(thrown.clone());
                thrown
            }
        }
    }

    /// The constructor dispatch path.
    ///
    /// The implementation's return value decides the instance: an object
    /// replaces the fresh target, anything else keeps it.
    pub fn construct(&self, args: Vec<Value>) -> Value {
        let selected = self.select_implementation();
        let new_target = ObjectRef::new();

        let index = self
            .tracking
            .lock()
            .record_entry(args.clone(), Value::Object(new_target.clone()));

        let outcome = match selected {
            Some(implementation) => {
                let (target, binding) = implementation.unwrap_bound();
                let args = match binding {
                    Some((_, mut bound_args)) => {
                        bound_args.extend(args);
                        bound_args
                    }
                    None => args,
                };
                target.call(Value::Object(new_target.clone()), args)
            }
            None => Ok(Value::Undefined),
        };

        let mut tracking = self.tracking.lock();
        match outcome {
            Ok(Value::Object(returned)) => {
                let instance = Value::Object(returned);
                tracking.instances.push(instance.clone());
                tracking.results[index] = MockResult::Return(instance.clone());
                instance
            }
            Ok(_) => {
                let instance = Value::Object(new_target);
                tracking.instances.push(instance.clone());
                tracking.results[index] = MockResult::Return(instance.clone());
                instance
            }
            Err(thrown) => {
                tracking.instances.push(Value::Object(new_target));
                tracking.results[index] = MockResult::Throw(thrown.clone());
                thrown
            }
        }
    }

    pub(crate) fn clear(&self) {
        *self.tracking.lock() = Tracking::default();
    }

    pub(crate) fn reset(&self) {
        self.clear();
        self.implementations.lock().once_queue.clear();
    }

    pub(crate) fn take_restore(&self) -> Option<RestoreThunk> {
        self.restore.lock().take()
    }
}

/// A callable-and-constructible tracked mock.
///
/// Cloning shares the underlying state; the handle is what test code keeps
/// to stub behavior and read tracking data.
#[derive(Clone)]
pub struct MockFn {
    state: Arc<MockState>,
    kind: CallableKind,
    registry: MockRegistry,
}

impl MockFn {
    pub(crate) fn with_state(
        state: Arc<MockState>,
        kind: CallableKind,
        registry: MockRegistry,
    ) -> Self {
        Self {
            state,
            kind,
            registry,
        }
    }

    pub(crate) fn state(&self) -> &Arc<MockState> {
        &self.state
    }

    /// The callable value backed by this mock, installable anywhere a
    /// function can live.
    pub fn callable(&self) -> Callable {
        Callable::mock(self.state.name.lock().clone(), self.kind, Arc::clone(&self.state))
    }

    /// Invokes the mock as a function.
    pub fn call(&self, this: Value, args: Vec<Value>) -> Value {
        self.state.invoke(this, args)
    }

    /// Invokes the mock as a constructor.
    pub fn construct(&self, args: Vec<Value>) -> Value {
        self.state.construct(args)
    }

    // Tracking accessors.

    /// The mock's diagnostic name.
    pub fn mock_name(&self) -> String {
        self.state.name.lock().clone()
    }

    /// Renames the mock for diagnostics.
    pub fn set_mock_name(&self, name: &str) -> &Self {
        *self.state.name.lock() = name.to_owned();
        self
    }

    /// Recorded argument lists, one per invocation.
    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.state.tracking.lock().calls.clone()
    }

    /// Number of recorded invocations.
    pub fn call_count(&self) -> usize {
        self.state.tracking.lock().calls.len()
    }

    /// The argument list of the n-th invocation (zero-based).
    pub fn nth_call(&self, index: usize) -> Option<Vec<Value>> {
        self.state.tracking.lock().calls.get(index).cloned()
    }

    /// The most recent argument list.
    pub fn last_call(&self) -> Option<Vec<Value>> {
        self.state.tracking.lock().calls.last().cloned()
    }

    /// Recorded receivers, one per invocation.
    pub fn contexts(&self) -> Vec<Value> {
        self.state.tracking.lock().contexts.clone()
    }

    /// Instances produced by constructor-path invocations.
    pub fn instances(&self) -> Vec<Value> {
        self.state.tracking.lock().instances.clone()
    }

    /// Per-invocation order indices, strictly increasing from 1.
    pub fn invocation_call_order(&self) -> Vec<u64> {
        self.state.tracking.lock().invocation_call_order.clone()
    }

    /// Per-invocation results.
    pub fn results(&self) -> Vec<MockResult> {
        self.state.tracking.lock().results.clone()
    }

    // Implementation management.

    /// Sets the default implementation.
    pub fn mock_implementation(&self, implementation: Callable) -> &Self {
        self.state.implementations.lock().default = Some(implementation);
        self
    }

    /// Queues a one-shot implementation (FIFO).
    pub fn mock_implementation_once(&self, implementation: Callable) -> &Self {
        self.state
            .implementations
            .lock()
            .once_queue
            .push_back(implementation);
        self
    }

    /// Default implementation returning `value`.
    pub fn mock_return_value(&self, value: Value) -> &Self {
        self.mock_implementation(Callable::function("mockReturnValue", move |_| {
            Ok(value.clone())
        }))
    }

    /// One-shot implementation returning `value`.
    pub fn mock_return_value_once(&self, value: Value) -> &Self {
        self.mock_implementation_once(Callable::function("mockReturnValueOnce", move |_| {
            Ok(value.clone())
        }))
    }

    /// Default implementation returning the call's receiver, for chaining
    /// APIs.
    pub fn mock_return_this(&self) -> &Self {
        self.mock_implementation(Callable::function("mockReturnThis", |context| {
            Ok(context.this.clone())
        }))
    }

    /// Default implementation returning a promise resolved with `value`.
    pub fn mock_resolved_value(&self, value: Value) -> &Self {
        self.mock_implementation(Callable::function("mockResolvedValue", move |_| {
            Ok(Value::promise_resolved(value.clone()))
        }))
    }

    /// One-shot implementation returning a promise resolved with `value`.
    pub fn mock_resolved_value_once(&self, value: Value) -> &Self {
        self.mock_implementation_once(Callable::function("mockResolvedValueOnce", move |_| {
            Ok(Value::promise_resolved(value.clone()))
        }))
    }

    /// Default implementation returning a promise rejected with `value`.
    pub fn mock_rejected_value(&self, value: Value) -> &Self {
        self.mock_implementation(Callable::function("mockRejectedValue", move |_| {
            Ok(Value::promise_rejected(value.clone()))
        }))
    }

    /// One-shot implementation returning a promise rejected with `value`.
    pub fn mock_rejected_value_once(&self, value: Value) -> &Self {
        self.mock_implementation_once(Callable::function("mockRejectedValueOnce", move |_| {
            Ok(Value::promise_rejected(value.clone()))
        }))
    }

    // Lifecycle.

    /// Empties every tracking array.
    pub fn mock_clear(&self) {
        self.state.clear();
    }

    /// [`MockFn::mock_clear`] plus dropping queued implementations.
    pub fn mock_reset(&self) {
        self.state.reset();
    }

    /// Unregisters the mock and reinstalls whatever it displaced.
    pub fn mock_restore(&self) {
        self.registry.unregister(&self.state);
        if let Some(restore) = self.state.take_restore() {
            restore();
        }
    }
}

impl std::fmt::Debug for MockFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tracking = self.state.tracking.lock();
        f.debug_struct("MockFn")
            .field("name", &*self.state.name.lock())
            .field("calls", &tracking.calls.len())
            .finish()
    }
}
