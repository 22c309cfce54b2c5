//! The decoded payload a transpiler attaches to a bundle.

use serde::{Deserialize, Serialize};

/// One decoded mapping: a generated position and the original position it
/// came from. All lines and columns are zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingToken {
    /// Line in the generated bundle.
    pub generated_line: u32,
    /// Column in the generated bundle.
    pub generated_column: u32,
    /// Index into [`SourceMapData::sources`].
    pub source_index: u32,
    /// Line in the original source.
    pub original_line: u32,
    /// Column in the original source.
    pub original_column: u32,
}

/// A complete decoded source map.
///
/// Mirrors the fields of a standard source-map object, with the VLQ
/// `mappings` string replaced by its decoded token list.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapData {
    /// Name of the generated file, when the transpiler recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Root prepended to every source path by consumers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    /// Original source paths, relative to the mapped file's directory.
    pub sources: Vec<String>,
    /// Original file contents, index-aligned with `sources`.
    #[serde(default)]
    pub sources_content: Vec<Option<String>>,
    /// Decoded mapping tokens in generated order.
    pub tokens: Vec<MappingToken>,
}
