//! Error enrichment: source-mapped stacks and code snippets.

use std::path::{Path, PathBuf};

use kestrel_schema::SerializedError;
use kestrel_source_map::{SourceMapIndex, SourceMapLookup};
use regex::Regex;
use serde::Serialize;

/// Knobs for mapped-stack rendering.
#[derive(Clone, Debug)]
pub struct StackTraceOptions {
    /// Include frames that belong to the engine's own runtime files.
    pub include_framework: bool,
    /// Include native and `node:` internal frames.
    pub active_native: bool,
    /// Path fragments identifying framework internals.
    pub framework_markers: Vec<String>,
}

impl Default for StackTraceOptions {
    fn default() -> Self {
        Self {
            include_framework: false,
            active_native: false,
            framework_markers: vec!["/kestrel/runtime/".to_owned(), "kestrel-runtime".to_owned()],
        }
    }
}

impl StackTraceOptions {
    fn is_framework(&self, file: &str) -> bool {
        self.framework_markers
            .iter()
            .any(|marker| file.contains(marker.as_str()))
    }
}

/// Renders the code block shown under a mapped error position.
///
/// The enricher only supplies the original line and position; presentation
/// (highlighting, context lines) is the formatter's business.
pub trait SnippetFormatter: Send + Sync {
    fn format(&self, code: &str, line: u32, column: u32) -> String;
}

/// The built-in formatter: the line with a caret underneath, no styling.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainSnippetFormatter;

impl SnippetFormatter for PlainSnippetFormatter {
    fn format(&self, code: &str, line: u32, column: u32) -> String {
        let label = format!("{} | ", line + 1);
        let caret_pad = " ".repeat(label.len() + column as usize);
        format!("{label}{code}\n{caret_pad}^")
    }
}

/// A serializable error with source-mapped positions.
#[derive(Clone, Debug, Serialize)]
pub struct EnrichedError {
    pub name: String,
    pub message: String,
    /// The stack string exactly as emitted by the sandbox.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// The source-mapped rendition, one line per surviving frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacks: Option<String>,
    /// Original-source position of the error itself, when resolvable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// The original source line at that position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// The formatted snippet block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_code: Option<String>,
    /// The enriched cause chain, when the error carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<EnrichedError>>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ParsedFrame {
    Standard {
        name: Option<String>,
        file: String,
        line: u32,
        column: u32,
    },
    /// `at async Promise.all (index: k)` aggregation frames.
    PromiseAggregation { method: String, index: u32 },
    Native { name: Option<String> },
}

/// Parses a V8-style stack string into frames, dropping the message line.
pub(crate) fn parse_stack(stack: &str) -> Vec<ParsedFrame> {
    let promise = Regex::new(r"^at async Promise\.(\w+) \(index: (\d+)\)$")
        .expect("static regex compiles");
    let with_source = Regex::new(r"^at (?:async )?(?:(.+?) )?\(?([^()]+):(\d+):(\d+)\)?$")
        .expect("static regex compiles");
    let native =
        Regex::new(r"^at (?:async )?(?:(.+?) )?\(native\)$").expect("static regex compiles");

    stack
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("at "))
        .filter_map(|line| {
            if let Some(captures) = promise.captures(line) {
                return Some(ParsedFrame::PromiseAggregation {
                    method: captures[1].to_owned(),
                    index: captures[2].parse().ok()?,
                });
            }
            if let Some(captures) = native.captures(line) {
                return Some(ParsedFrame::Native {
                    name: captures.get(1).map(|m| m.as_str().to_owned()),
                });
            }
            let captures = with_source.captures(line)?;
            Some(ParsedFrame::Standard {
                name: captures.get(1).map(|m| m.as_str().trim().to_owned()),
                file: normalize_file(&captures[2]),
                line: captures[3].parse().ok()?,
                column: captures[4].parse().ok()?,
            })
        })
        .collect()
}

/// `file://` URLs become local paths; HTTP(S) URLs pass through untouched.
fn normalize_file(file: &str) -> String {
    file.strip_prefix("file://").unwrap_or(file).to_owned()
}

fn mapped_source_path(generated: &Path, source: &str) -> PathBuf {
    generated
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(source)
}

/// Rewrites `error` against `map`: excluded frames are dropped, surviving
/// frames are rendered as `at <name> <mapped-path>#L<line> [<line>:<col>]`,
/// and the error's own position gains the original code line plus a
/// formatted snippet.
pub fn enrich(
    error: &SerializedError,
    map: &SourceMapIndex,
    options: &StackTraceOptions,
    formatter: &dyn SnippetFormatter,
) -> EnrichedError {
    let frames = error.stack.as_deref().map(parse_stack).unwrap_or_default();

    let mut message = error.message.clone();
    let mut rewrite_pending =
        error.name == "TypeError" && message.ends_with(" is not a function");

    let mut lines = Vec::new();
    // Position derived from the first resolvable frame, used when the error
    // carries no position of its own.
    let mut derived: Option<(u32, u32, Option<String>)> = None;

    for frame in &frames {
        match frame {
            ParsedFrame::PromiseAggregation { method, index } => {
                lines.push(format!("at async Promise.{method} (index: {index})"));
            }
            ParsedFrame::Native { name } => {
                if options.active_native {
                    lines.push(format!("at {} (native)", display_name(name.as_deref())));
                }
            }
            ParsedFrame::Standard {
                name,
                file,
                line,
                column,
            } => {
                if file.starts_with("node:") && !options.active_native {
                    continue;
                }
                if options.is_framework(file) && !options.include_framework {
                    continue;
                }

                // Stack strings are one-based; the map speaks zero-based.
                let resolved =
                    map.resolve_with_code(line.saturating_sub(1), column.saturating_sub(1));
                match resolved {
                    Some(excerpt) => {
                        let mapped = mapped_source_path(map.generated_path(), &excerpt.position.source);
                        let display_line = excerpt.position.line + 1;
                        let display_column = excerpt.position.column + 1;
                        lines.push(format!(
                            "at {} {}#L{display_line} [{display_line}:{display_column}]",
                            display_name(name.as_deref()),
                            mapped.display(),
                        ));

                        if derived.is_none() {
                            derived = Some((
                                excerpt.position.line,
                                excerpt.position.column,
                                excerpt.code.clone(),
                            ));
                        }
                        if rewrite_pending {
                            if let Some(known) = name.as_deref() {
                                message = format!("{known} is not a function");
                                rewrite_pending = false;
                            }
                        }
                    }
                    None => {
                        lines.push(format!(
                            "at {} {file}#L{line} [{line}:{column}]",
                            display_name(name.as_deref()),
                        ));
                    }
                }
            }
        }
    }

    // The error's own location takes precedence over frame-derived data.
    let own = error
        .location
        .and_then(|location| {
            map.resolve_with_code(location.line, location.column)
                .map(|excerpt| (excerpt.position.line, excerpt.position.column, excerpt.code))
        })
        .or(derived);

    let (line, column, code) = match own {
        Some((line, column, code)) => (Some(line), Some(column), code),
        None => (None, None, None),
    };
    let format_code = match (&code, line, column) {
        (Some(code), Some(line), Some(column)) => Some(formatter.format(code, line, column)),
        _ => None,
    };

    EnrichedError {
        name: error.name.clone(),
        message,
        stack: error.stack.clone(),
        stacks: (!lines.is_empty()).then(|| lines.join("\n")),
        line,
        column,
        code,
        format_code,
        cause: error
            .cause
            .as_deref()
            .map(|cause| Box::new(enrich(cause, map, options, formatter))),
    }
}

fn display_name(name: Option<&str>) -> &str {
    name.unwrap_or("<anonymous>")
}
