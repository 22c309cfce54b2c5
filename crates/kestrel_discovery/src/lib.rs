//! Spec-file discovery.
//!
//! Configuration patterns come in three shapes: regexes (used as-is), glob
//! strings (compiled to regexes), and literal paths (escaped and anchored).
//! [`discover`] walks a project root with a compiled [`PatternSet`] and
//! returns the matching files as a relative-to-absolute path map.

mod pattern;
mod walk;

pub use pattern::{PatternError, PatternSet, SpecPattern};
pub use walk::discover;
