//! The dynamic value world mocks operate in.

use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::mock_fn::MockState;

/// Result of running a callable: `Err` carries the thrown value.
pub type Outcome = Result<Value, Value>;

/// A dynamically typed value.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Object(ObjectRef),
    /// An already-settled promise, as produced by the resolved/rejected
    /// mock shortcuts.
    Promise(Arc<PromiseValue>),
    Callable(Callable),
}

/// A settled promise value.
#[derive(Clone, Debug, PartialEq)]
pub enum PromiseValue {
    Resolved(Value),
    Rejected(Value),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn number(value: impl Into<f64>) -> Self {
        Self::Number(value.into())
    }

    /// A promise settled with `value`.
    pub fn promise_resolved(value: Value) -> Self {
        Self::Promise(Arc::new(PromiseValue::Resolved(value)))
    }

    /// A promise rejected with `value`.
    pub fn promise_rejected(value: Value) -> Self {
        Self::Promise(Arc::new(PromiseValue::Rejected(value)))
    }

    /// Whether this value is an object (the only valid spy target).
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Self::Callable(callable) => Some(callable),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(fields) => {
                let object = ObjectRef::new();
                for (key, field) in fields {
                    object.define(&key, PropertyDescriptor::data(field.into()));
                }
                Self::Object(object)
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            // Objects and callables compare by identity.
            (Self::Object(a), Self::Object(b)) => ObjectRef::ptr_eq(a, b),
            (Self::Callable(a), Self::Callable(b)) => Callable::ptr_eq(a, b),
            (Self::Promise(a), Self::Promise(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Object(_) => write!(f, "[object]"),
            Self::Promise(p) => match p.as_ref() {
                PromiseValue::Resolved(v) => write!(f, "Promise::resolved({v:?})"),
                PromiseValue::Rejected(v) => write!(f, "Promise::rejected({v:?})"),
            },
            Self::Callable(c) => write!(f, "[callable {}]", c.name()),
        }
    }
}

/// How a property is defined on an object.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyKind {
    /// A plain value slot.
    Data { value: Value, writable: bool },
    /// Getter/setter pair; either side may be absent.
    Accessor {
        get: Option<Callable>,
        set: Option<Callable>,
    },
}

/// A property descriptor, the unit a spy captures and restores.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDescriptor {
    pub kind: PropertyKind,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertyDescriptor {
    /// A writable, enumerable, configurable data property.
    pub fn data(value: Value) -> Self {
        Self {
            kind: PropertyKind::Data {
                value,
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// An enumerable, configurable accessor property.
    pub fn accessor(get: Option<Callable>, set: Option<Callable>) -> Self {
        Self {
            kind: PropertyKind::Accessor { get, set },
            enumerable: true,
            configurable: true,
        }
    }

    /// The data value, when this is a data property.
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            PropertyKind::Data { value, .. } => Some(value),
            PropertyKind::Accessor { .. } => None,
        }
    }
}

#[derive(Default)]
struct ObjectData {
    properties: IndexMap<String, PropertyDescriptor>,
}

/// A shared, mutable object with an insertion-ordered property table.
#[derive(Clone, Default)]
pub struct ObjectRef {
    data: Arc<Mutex<ObjectData>>,
}

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity comparison.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }

    /// Defines or replaces a property.
    pub fn define(&self, key: &str, descriptor: PropertyDescriptor) {
        self.data
            .lock()
            .properties
            .insert(key.to_owned(), descriptor);
    }

    /// Removes a property, returning its descriptor.
    pub fn remove(&self, key: &str) -> Option<PropertyDescriptor> {
        self.data.lock().properties.shift_remove(key)
    }

    /// A snapshot of the property's descriptor.
    pub fn descriptor(&self, key: &str) -> Option<PropertyDescriptor> {
        self.data.lock().properties.get(key).cloned()
    }

    /// Own enumerable property names, in insertion order.
    pub fn enumerable_keys(&self) -> Vec<String> {
        self.data
            .lock()
            .properties
            .iter()
            .filter(|(_, descriptor)| descriptor.enumerable)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Whether the object carries an own enumerable property of this name.
    pub fn has_enumerable(&self, key: &str) -> bool {
        self.data
            .lock()
            .properties
            .get(key)
            .is_some_and(|descriptor| descriptor.enumerable)
    }

    /// Reads a property: data slots return their value, accessors run their
    /// getter with this object as `this`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let descriptor = self.descriptor(key)?;
        match descriptor.kind {
            PropertyKind::Data { value, .. } => Some(value),
            PropertyKind::Accessor { get, .. } => {
                let getter = get?;
                Some(
                    getter
                        .call(Value::Object(self.clone()), Vec::new())
                        .unwrap_or(Value::Undefined),
                )
            }
        }
    }

    /// Writes a property: writable data slots are replaced, accessors run
    /// their setter. Non-writable slots are silently left untouched.
    pub fn set(&self, key: &str, value: Value) {
        let descriptor = self.descriptor(key);
        match descriptor.map(|descriptor| descriptor.kind) {
            Some(PropertyKind::Accessor { set, .. }) => {
                if let Some(setter) = set {
                    let _ = setter.call(Value::Object(self.clone()), vec![value]);
                }
            }
            Some(PropertyKind::Data { writable: false, .. }) => {}
            _ => self.define(key, PropertyDescriptor::data(value)),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.lock();
        f.debug_map()
            .entries(data.properties.keys().map(|key| (key, "..")))
            .finish()
    }
}

/// Arguments and receiver of one call.
pub struct CallContext {
    /// The receiver.
    pub this: Value,
    /// Effective argument list.
    pub args: Vec<Value>,
    /// The freshly allocated instance when invoked as a constructor.
    pub new_target: Option<ObjectRef>,
}

type NativeFn = Arc<dyn Fn(&CallContext) -> Outcome + Send + Sync>;

/// Whether a callable may be invoked with `new`-semantics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallableKind {
    Function,
    /// Constructor-like: the original carried a non-writable prototype.
    Constructor,
}

enum Behavior {
    Native(NativeFn),
    Mock(Arc<MockState>),
    Bound {
        target: Callable,
        bound_this: Value,
        bound_args: Vec<Value>,
    },
}

struct CallableInner {
    name: String,
    kind: CallableKind,
    behavior: Behavior,
}

/// A function-like value: a native closure, a tracked mock, or a bound
/// wrapper around either.
#[derive(Clone)]
pub struct Callable {
    inner: Arc<CallableInner>,
}

impl Callable {
    /// A plain function backed by a native closure.
    pub fn function(
        name: impl Into<String>,
        body: impl Fn(&CallContext) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(CallableInner {
                name: name.into(),
                kind: CallableKind::Function,
                behavior: Behavior::Native(Arc::new(body)),
            }),
        }
    }

    /// A constructor backed by a native closure.
    pub fn constructor(
        name: impl Into<String>,
        body: impl Fn(&CallContext) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(CallableInner {
                name: name.into(),
                kind: CallableKind::Constructor,
                behavior: Behavior::Native(Arc::new(body)),
            }),
        }
    }

    pub(crate) fn mock(name: impl Into<String>, kind: CallableKind, state: Arc<MockState>) -> Self {
        Self {
            inner: Arc::new(CallableInner {
                name: name.into(),
                kind,
                behavior: Behavior::Mock(state),
            }),
        }
    }

    /// A wrapper with a fixed receiver and leading arguments.
    pub fn bind(&self, bound_this: Value, bound_args: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(CallableInner {
                name: format!("bound {}", self.name()),
                kind: self.kind(),
                behavior: Behavior::Bound {
                    target: self.clone(),
                    bound_this,
                    bound_args,
                },
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> CallableKind {
        self.inner.kind
    }

    /// Identity comparison.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// The tracked mock behind this callable, if it is one.
    pub fn mock_state(&self) -> Option<&Arc<MockState>> {
        match &self.inner.behavior {
            Behavior::Mock(state) => Some(state),
            _ => None,
        }
    }

    /// Peels bound wrappers, accumulating the receiver and leading args of
    /// the innermost binding.
    pub(crate) fn unwrap_bound(&self) -> (Self, Option<(Value, Vec<Value>)>) {
        let mut current = self.clone();
        let mut binding: Option<(Value, Vec<Value>)> = None;

        while let Behavior::Bound {
            target,
            bound_this,
            bound_args,
        } = &current.inner.behavior
        {
            let (this, mut args) = (bound_this.clone(), bound_args.clone());
            if let Some((_, trailing)) = binding {
                args.extend(trailing);
            }
            binding = Some((this, args));
            current = target.clone();
        }

        (current, binding)
    }

    /// Invokes the callable as a plain function.
    pub fn call(&self, this: Value, args: Vec<Value>) -> Outcome {
        match &self.inner.behavior {
            Behavior::Native(body) => body(&CallContext {
                this,
                args,
                new_target: None,
            }),
            Behavior::Mock(state) => Ok(state.invoke(this, args)),
            Behavior::Bound { .. } => {
                let (target, binding) = self.unwrap_bound();
                let (this, args) = match binding {
                    Some((bound_this, mut bound_args)) => {
                        bound_args.extend(args);
                        (bound_this, bound_args)
                    }
                    None => (this, args),
                };
                target.call(this, args)
            }
        }
    }

    /// Invokes the callable as a constructor.
    pub fn construct(&self, args: Vec<Value>) -> Outcome {
        match &self.inner.behavior {
            Behavior::Native(body) => {
                let new_target = ObjectRef::new();
                let context = CallContext {
                    this: Value::Object(new_target.clone()),
                    args,
                    new_target: Some(new_target.clone()),
                };
                match body(&context)? {
                    Value::Object(returned) => Ok(Value::Object(returned)),
                    _ => Ok(Value::Object(new_target)),
                }
            }
            Behavior::Mock(state) => Ok(state.construct(args)),
            Behavior::Bound { .. } => {
                let (target, binding) = self.unwrap_bound();
                let args = match binding {
                    Some((_, mut bound_args)) => {
                        bound_args.extend(args);
                        bound_args
                    }
                    None => args,
                };
                target.construct(args)
            }
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match &self.inner.behavior {
            Behavior::Native(_) => "native",
            Behavior::Mock(_) => "mock",
            Behavior::Bound { .. } => "bound",
        };
        write!(f, "Callable({tag} '{}')", self.inner.name)
    }
}
