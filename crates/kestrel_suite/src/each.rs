//! Each-parameterization: case expansion and description interpolation.

use serde_json::Value;

/// One expanded case of a parameterized test or describe.
#[derive(Clone, Debug, PartialEq)]
pub struct EachCase {
    /// Arguments passed to the body.
    pub args: Vec<Value>,
}

impl EachCase {
    /// The record of a table case, when the case came from a table.
    fn record(&self) -> Option<&serde_json::Map<String, Value>> {
        match self.args.first() {
            Some(Value::Object(record)) if self.args.len() == 1 => Some(record),
            _ => None,
        }
    }
}

/// Expands the table form: a `"col1|col2|..."` heading plus row values,
/// yielding one record per row keyed by the column headings.
///
/// Rows shorter than the heading leave the missing columns `null`; longer
/// rows drop the excess.
pub fn table_cases(headings: &str, rows: Vec<Vec<Value>>) -> Vec<EachCase> {
    let columns: Vec<String> = headings
        .split('|')
        .map(|heading| heading.trim().to_owned())
        .collect();

    rows.into_iter()
        .map(|row| {
            let mut record = serde_json::Map::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(
                    column.clone(),
                    row.get(index).cloned().unwrap_or(Value::Null),
                );
            }
            EachCase {
                args: vec![Value::Object(record)],
            }
        })
        .collect()
}

/// Expands the positional form: each value becomes one case; an array value
/// is spread as that case's argument list.
pub fn value_cases(values: Vec<Value>) -> Vec<EachCase> {
    values
        .into_iter()
        .map(|value| match value {
            Value::Array(args) => EachCase { args },
            other => EachCase { args: vec![other] },
        })
        .collect()
}

/// Interpolates a case description template.
///
/// Positional placeholders: `%s %d %i %f %j %o %p` consume arguments in
/// order, `%#` is the case index, `%%` a literal percent. Named
/// placeholders `$prop[.path]` and `$#` draw from the case record; the two
/// families do not mix (except `%%`), named placeholders win when present.
pub fn format_case_description(template: &str, case: &EachCase, index: usize) -> String {
    if uses_named_placeholders(template) {
        format_named(template, case, index)
    } else {
        format_positional(template, case, index)
    }
}

fn uses_named_placeholders(template: &str) -> bool {
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            if let Some(next) = chars.peek() {
                if *next == '#' || next.is_alphabetic() || *next == '_' {
                    return true;
                }
            }
        }
    }
    false
}

fn format_positional(template: &str, case: &EachCase, index: usize) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = case.args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(marker) = chars.next() else {
            out.push('%');
            break;
        };
        match marker {
            '%' => out.push('%'),
            '#' => out.push_str(&index.to_string()),
            's' => out.push_str(&stringify(args.next())),
            'd' | 'i' => out.push_str(&integerify(args.next())),
            'f' => out.push_str(&floatify(args.next())),
            'j' | 'o' | 'p' => out.push_str(&jsonify(args.next())),
            other => {
                out.push('%');
                out.push(other);
            }
        }
    }

    out
}

fn format_named(template: &str, case: &EachCase, index: usize) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            // Only the `%%` escape participates in named mode.
            if chars.peek() == Some(&'%') {
                chars.next();
            }
            out.push('%');
            continue;
        }
        if c != '$' {
            out.push(c);
            continue;
        }

        if chars.peek() == Some(&'#') {
            chars.next();
            out.push_str(&index.to_string());
            continue;
        }

        let mut path = String::new();
        while let Some(next) = chars.peek() {
            if next.is_alphanumeric() || *next == '_' || *next == '.' {
                path.push(*next);
                chars.next();
            } else {
                break;
            }
        }
        if path.is_empty() {
            out.push('$');
            continue;
        }

        match lookup_path(case, &path) {
            Some(value) => out.push_str(&stringify(Some(&value))),
            None => {
                out.push('$');
                out.push_str(&path);
            }
        }
    }

    out
}

fn lookup_path(case: &EachCase, path: &str) -> Option<Value> {
    let record = case.record()?;
    let mut current = record.get(path.split('.').next()?)?.clone();
    for segment in path.split('.').skip(1) {
        current = current.get(segment)?.clone();
    }
    Some(current)
}

fn stringify(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_owned(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) => "null".to_owned(),
        Some(other) => other.to_string(),
    }
}

fn integerify(value: Option<&Value>) -> String {
    match value.and_then(Value::as_f64) {
        Some(number) => format!("{}", number.trunc() as i64),
        None => stringify(value),
    }
}

fn floatify(value: Option<&Value>) -> String {
    match value.and_then(Value::as_f64) {
        Some(number) => format!("{number}"),
        None => stringify(value),
    }
}

fn jsonify(value: Option<&Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "undefined".to_owned(),
    }
}
