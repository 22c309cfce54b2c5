//! Position lookups over a decoded source map.

use std::path::{Path, PathBuf};

use crate::data::{MappingToken, SourceMapData};

/// Errors raised while loading a source map payload.
///
/// Every variant is reported to the wire under the `SourceMapLoadFailure`
/// kind.
#[derive(Debug, thiserror::Error)]
pub enum SourceMapError {
    /// The payload was not a valid decoded source map.
    #[error("failed to parse source map for '{}': {source}", path.display())]
    Parse {
        /// The generated file the payload belongs to.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A token referenced a source index past the end of `sources`.
    #[error(
        "source map for '{}' references source index {index} but lists {count} source(s)",
        path.display()
    )]
    SourceIndexOutOfRange {
        /// The generated file the payload belongs to.
        path: PathBuf,
        /// The offending index.
        index: u32,
        /// Number of listed sources.
        count: usize,
    },
}

impl SourceMapError {
    /// The error-taxonomy kind under which this error is serialized.
    pub fn kind(&self) -> &'static str {
        "SourceMapLoadFailure"
    }
}

/// An original position resolved from a generated one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappedPosition {
    /// Original source path as listed by the map.
    pub source: String,
    /// Zero-based line in the original source.
    pub line: u32,
    /// Zero-based column in the original source.
    pub column: u32,
    /// The map's source root, if any.
    pub source_root: Option<String>,
}

/// A resolved position together with the original source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappedExcerpt {
    pub position: MappedPosition,
    /// The original line of code, when the map embeds source contents.
    pub code: Option<String>,
}

/// The capability the coordinator consumes.
///
/// [`SourceMapIndex`] is the in-tree implementation; an adapter over any
/// source-map decoding library satisfies the same contract.
pub trait SourceMapLookup: Send + Sync {
    /// Maps a generated position back to its original position.
    fn resolve(&self, line: u32, column: u32) -> Option<MappedPosition>;

    /// Like [`SourceMapLookup::resolve`], also fetching the original line.
    fn resolve_with_code(&self, line: u32, column: u32) -> Option<MappedExcerpt>;

    /// Absolute path of the generated file this map belongs to.
    fn generated_path(&self) -> &Path;
}

/// An index over decoded mapping tokens.
#[derive(Clone, Debug)]
pub struct SourceMapIndex {
    generated_path: PathBuf,
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    source_root: Option<String>,
    /// Sorted by (generated line, generated column).
    tokens: Vec<MappingToken>,
}

impl SourceMapIndex {
    /// Indexes a decoded payload for the given generated file.
    pub fn new(data: SourceMapData, generated_path: PathBuf) -> Result<Self, SourceMapError> {
        let SourceMapData {
            file: _,
            source_root,
            sources,
            mut sources_content,
            mut tokens,
        } = data;

        for token in &tokens {
            if token.source_index as usize >= sources.len() {
                return Err(SourceMapError::SourceIndexOutOfRange {
                    path: generated_path,
                    index: token.source_index,
                    count: sources.len(),
                });
            }
        }

        tokens.sort_by_key(|token| (token.generated_line, token.generated_column));
        sources_content.resize(sources.len(), None);

        Ok(Self {
            generated_path,
            sources,
            sources_content,
            source_root,
            tokens,
        })
    }

    /// Parses the JSON form of a decoded payload and indexes it.
    pub fn parse(payload: &str, generated_path: PathBuf) -> Result<Self, SourceMapError> {
        let data: SourceMapData =
            serde_json::from_str(payload).map_err(|source| SourceMapError::Parse {
                path: generated_path.clone(),
                source,
            })?;
        Self::new(data, generated_path)
    }

    /// The greatest token on `line` at or before `column`.
    fn token_at(&self, line: u32, column: u32) -> Option<&MappingToken> {
        let after = self
            .tokens
            .partition_point(|token| (token.generated_line, token.generated_column) <= (line, column));
        let token = self.tokens[..after].last()?;
        (token.generated_line == line).then_some(token)
    }

    fn original_line(&self, token: &MappingToken) -> Option<String> {
        let content = self
            .sources_content
            .get(token.source_index as usize)?
            .as_deref()?;
        content
            .lines()
            .nth(token.original_line as usize)
            .map(str::to_owned)
    }
}

impl SourceMapLookup for SourceMapIndex {
    fn resolve(&self, line: u32, column: u32) -> Option<MappedPosition> {
        let token = self.token_at(line, column)?;
        Some(MappedPosition {
            source: self.sources[token.source_index as usize].clone(),
            line: token.original_line,
            column: token.original_column,
            source_root: self.source_root.clone(),
        })
    }

    fn resolve_with_code(&self, line: u32, column: u32) -> Option<MappedExcerpt> {
        let token = self.token_at(line, column)?;
        let code = self.original_line(token);
        Some(MappedExcerpt {
            position: MappedPosition {
                source: self.sources[token.source_index as usize].clone(),
                line: token.original_line,
                column: token.original_column,
                source_root: self.source_root.clone(),
            },
            code,
        })
    }

    fn generated_path(&self) -> &Path {
        &self.generated_path
    }
}
