//! Installing mocks onto objects and scopes.

use crate::{
    error::MockError,
    mock_fn::MockFn,
    registry::MockRegistry,
    value::{Callable, ObjectRef, PropertyDescriptor, PropertyKind, Value},
};

/// The scope object searched when mocking a free function.
///
/// Carriers are the scope's own enumerable object-valued properties; the
/// lookup is single-level by contract. Callers that know the owning object
/// should prefer [`mock_method`] and skip the scan entirely.
#[derive(Clone, Default)]
pub struct GlobalScope {
    root: ObjectRef,
}

impl GlobalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scope object itself.
    pub fn root(&self) -> &ObjectRef {
        &self.root
    }

    /// Adds a named carrier object to the scope.
    pub fn define_carrier(&self, name: &str, object: ObjectRef) {
        self.root
            .define(name, PropertyDescriptor::data(Value::Object(object)));
    }

    /// Finds the carrier owning a property named `name`.
    fn find_owner(&self, name: &str) -> Option<ObjectRef> {
        for key in self.root.enumerable_keys() {
            let Some(descriptor) = self.root.descriptor(&key) else {
                continue;
            };
            let Some(Value::Object(candidate)) = descriptor.value() else {
                continue;
            };
            if candidate.has_enumerable(name) {
                return Some(candidate.clone());
            }
        }
        None
    }
}

/// Replaces the method at `owner[key]` with a tracking mock.
///
/// The mock wraps the original callable as its default implementation, so
/// behavior is preserved until an implementation is stubbed. A restore thunk
/// reinstalling the captured descriptor is recorded for
/// `mock_restore`/`restore_all`.
pub fn mock_method(
    registry: &MockRegistry,
    owner: &ObjectRef,
    key: &str,
) -> Result<MockFn, MockError> {
    let descriptor = owner
        .descriptor(key)
        .ok_or_else(|| MockError::MethodNotOnObject {
            name: key.to_owned(),
        })?;

    install_over_data_property(registry, owner, key, descriptor, |name| {
        MockError::InvalidMethodType { name }
    })
}

/// Replaces a free function with a tracking mock by scanning `scope` for its
/// parent carrier.
pub fn mock_function(
    registry: &MockRegistry,
    scope: &GlobalScope,
    name: &str,
) -> Result<MockFn, MockError> {
    let owner = scope
        .find_owner(name)
        .ok_or_else(|| MockError::MethodNotOnObject {
            name: name.to_owned(),
        })?;
    mock_method(registry, &owner, name)
}

/// Spies on `target[key]`.
///
/// Accessor properties get a single mock standing in for both getter and
/// setter: reads return the mock's default-implementation result (initially
/// the original getter), writes record the assigned value as a call. Data
/// properties holding callables behave like [`mock_method`].
pub fn spy_on(
    registry: &MockRegistry,
    target: &Value,
    key: Option<&str>,
) -> Result<MockFn, MockError> {
    let owner = target.as_object().ok_or(MockError::PrimitiveTarget)?;
    let key = match key {
        Some(key) if !key.is_empty() => key,
        _ => return Err(MockError::NoPropertyName),
    };
    let descriptor = owner
        .descriptor(key)
        .ok_or_else(|| MockError::PropertyNotFound {
            name: key.to_owned(),
        })?;

    match &descriptor.kind {
        PropertyKind::Accessor { get, .. } => {
            let original = descriptor.clone();
            let owner_for_restore = owner.clone();
            let key_owned = key.to_owned();
            let restore = Box::new(move || {
                owner_for_restore.define(&key_owned, original);
            });

            let mock = registry.mock_fn(get.clone(), Some(restore), Some(key));

            let stand_in = mock.callable();
            owner.define(
                key,
                PropertyDescriptor {
                    kind: PropertyKind::Accessor {
                        get: Some(stand_in.clone()),
                        set: Some(stand_in),
                    },
                    enumerable: descriptor.enumerable,
                    configurable: descriptor.configurable,
                },
            );

            Ok(mock)
        }
        PropertyKind::Data { .. } => {
            install_over_data_property(registry, owner, key, descriptor, |name| {
                MockError::InvalidMethodType { name }
            })
        }
    }
}

/// Swaps a callable-valued data property for a mock wrapping the original.
fn install_over_data_property(
    registry: &MockRegistry,
    owner: &ObjectRef,
    key: &str,
    descriptor: PropertyDescriptor,
    not_callable: impl FnOnce(String) -> MockError,
) -> Result<MockFn, MockError> {
    let PropertyKind::Data { value, writable } = &descriptor.kind else {
        return Err(not_callable(key.to_owned()));
    };
    let Some(original) = value.as_callable().cloned() else {
        return Err(not_callable(key.to_owned()));
    };

    let captured = descriptor.clone();
    let owner_for_restore = owner.clone();
    let key_owned = key.to_owned();
    let restore = Box::new(move || {
        owner_for_restore.define(&key_owned, captured);
    });

    let mock = registry.mock_fn(Some(original), Some(restore), Some(key));

    owner.define(
        key,
        PropertyDescriptor {
            kind: PropertyKind::Data {
                value: Value::Callable(mock.callable()),
                writable: *writable,
            },
            enumerable: descriptor.enumerable,
            configurable: descriptor.configurable,
        },
    );

    Ok(mock)
}
