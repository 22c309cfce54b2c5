//! Mock installation errors.

/// Errors raised while installing a mock or spy.
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    /// A free function could not be located on any reachable scope carrier.
    #[error("unable to locate '{name}' on any reachable scope object")]
    MethodNotOnObject {
        /// The function name searched for.
        name: String,
    },

    /// The targeted property does not hold a callable.
    #[error("'{name}' is not a callable method")]
    InvalidMethodType {
        /// The property name.
        name: String,
    },

    /// Spying requires an object target.
    #[error("cannot spy on a primitive value")]
    PrimitiveTarget,

    /// Spying requires a property name.
    #[error("a property name is required to create a spy")]
    NoPropertyName,

    /// The named property does not exist on the target.
    #[error("property '{name}' does not exist on the target object")]
    PropertyNotFound {
        /// The property name.
        name: String,
    },
}
