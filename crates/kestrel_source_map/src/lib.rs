//! Source-map consumption for the coordinator.
//!
//! The engine never decodes VLQ mappings itself: the transpiler attaches a
//! payload of already-decoded [`MappingToken`]s to every bundle, and this
//! crate indexes those tokens for generated-to-original position lookups.
//! Any decoding library can be plugged in by satisfying [`SourceMapLookup`].

mod data;
mod index;

pub use data::{MappingToken, SourceMapData};
pub use index::{MappedExcerpt, MappedPosition, SourceMapError, SourceMapIndex, SourceMapLookup};
