//! Pattern compilation.

use regex::Regex;

/// Errors raised while compiling file patterns.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// The pattern did not compile to a valid regex.
    #[error("failed to compile pattern '{pattern}': {source}")]
    Compile {
        /// The offending pattern.
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A single file pattern from configuration.
#[derive(Clone, Debug)]
pub enum SpecPattern {
    /// A pre-built regex, used as-is.
    Regex(Regex),
    /// A glob string: `**` spans any depth (including zero), `*` any chars
    /// except the separator, `?` a single char, `{a,b}` alternation,
    /// `[abc]`/`[a-z]` a class; everything else is matched literally.
    Glob(String),
    /// A literal path, escaped and anchored.
    Literal(String),
}

impl SpecPattern {
    /// Classifies a configuration string: globs contain at least one glob
    /// metacharacter, everything else is a literal path.
    pub fn from_config_str(pattern: &str) -> Self {
        if pattern.chars().any(|c| matches!(c, '*' | '?' | '{' | '[')) {
            Self::Glob(pattern.to_owned())
        } else {
            Self::Literal(pattern.to_owned())
        }
    }

    /// Compiles this pattern into an anchored regex over `/`-separated paths.
    pub fn compile(&self) -> Result<Regex, PatternError> {
        let source = match self {
            Self::Regex(regex) => return Ok(regex.clone()),
            Self::Glob(glob) => format!("^{}$", glob_to_regex(glob)),
            Self::Literal(path) => format!("^{}$", regex::escape(path)),
        };

        Regex::new(&source).map_err(|source_err| PatternError::Compile {
            pattern: source,
            source: source_err,
        })
    }
}

/// Translates one glob string into regex source.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut chars = glob.chars().peekable();
    let mut brace_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        // `**/` also matches zero directories.
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                out.push(')');
            }
            ',' if brace_depth > 0 => out.push('|'),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for class_char in chars.by_ref() {
                    if class_char == ']' {
                        break;
                    }
                    if class_char == '\\' {
                        out.push('\\');
                    }
                    out.push(class_char);
                }
                out.push(']');
            }
            '.' | '+' | '(' | ')' | '^' | '$' | '|' | '\\' | '}' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }

    out
}

/// The compiled include/exclude/suites pattern lists used by discovery.
#[derive(Clone, Debug, Default)]
pub struct PatternSet {
    /// Files to include.
    pub files: Vec<Regex>,
    /// Paths suppressed before any include check.
    pub exclude: Vec<Regex>,
    /// Optional further restriction on included files.
    pub suites: Option<Vec<Regex>>,
}

impl PatternSet {
    /// Compiles the three pattern lists.
    pub fn compile(
        files: &[SpecPattern],
        exclude: &[SpecPattern],
        suites: Option<&[SpecPattern]>,
    ) -> Result<Self, PatternError> {
        let compile_all = |patterns: &[SpecPattern]| {
            patterns
                .iter()
                .map(SpecPattern::compile)
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            files: compile_all(files)?,
            exclude: compile_all(exclude)?,
            suites: suites.map(compile_all).transpose()?,
        })
    }

    /// Whether any exclude pattern matches the path.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|regex| regex.is_match(path))
    }

    /// Whether a (non-excluded) file belongs to the run: any `files` pattern
    /// matches, and either no `suites` list exists or one of its patterns
    /// matches too.
    pub fn is_included(&self, path: &str) -> bool {
        if !self.files.iter().any(|regex| regex.is_match(path)) {
            return false;
        }
        match &self.suites {
            None => true,
            Some(suites) => suites.iter().any(|regex| regex.is_match(path)),
        }
    }
}
