//! Assertion surface for test bodies.
//!
//! Matchers return `Result<(), TestFailure>` so bodies can bubble failures
//! with `?`; every failure carries the expectation's registration position
//! and the matcher name.

use kestrel_mock::{MockFn, MockResult, Value as MockValue};
use kestrel_schema::ErrorLocation;
use serde_json::Value;

use crate::test::TestFailure;

/// Starts an expectation over a JSON-ish value.
#[track_caller]
pub fn expect_value(actual: Value) -> ValueExpectation {
    ValueExpectation {
        actual,
        negated: false,
        location: caller_location(),
    }
}

/// Starts an expectation over a mock's recorded activity.
#[track_caller]
pub fn expect_mock(mock: &MockFn) -> MockExpectation {
    MockExpectation {
        mock: mock.clone(),
        negated: false,
        location: caller_location(),
    }
}

/// An expectation over a value.
pub struct ValueExpectation {
    actual: Value,
    negated: bool,
    location: ErrorLocation,
}

impl ValueExpectation {
    /// Inverts the following matcher.
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Deep equality.
    pub fn to_equal(self, expected: &Value) -> Result<(), TestFailure> {
        let pass = self.actual == *expected;
        self.verdict(pass, "toEqual", format!("{} to equal {expected}", self.actual))
    }

    /// JavaScript-style truthiness.
    pub fn to_be_truthy(self) -> Result<(), TestFailure> {
        let pass = is_truthy(&self.actual);
        self.verdict(pass, "toBeTruthy", format!("{} to be truthy", self.actual))
    }

    pub fn to_be_falsy(self) -> Result<(), TestFailure> {
        let pass = !is_truthy(&self.actual);
        self.verdict(pass, "toBeFalsy", format!("{} to be falsy", self.actual))
    }

    pub fn to_be_null(self) -> Result<(), TestFailure> {
        let pass = self.actual.is_null();
        self.verdict(pass, "toBeNull", format!("{} to be null", self.actual))
    }

    /// Substring containment for strings, element containment for arrays.
    pub fn to_contain(self, needle: &Value) -> Result<(), TestFailure> {
        let pass = match (&self.actual, needle) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle),
            (Value::Array(items), needle) => items.contains(needle),
            _ => false,
        };
        self.verdict(pass, "toContain", format!("{} to contain {needle}", self.actual))
    }

    /// Length of a string, array, or object.
    pub fn to_have_length(self, expected: usize) -> Result<(), TestFailure> {
        let length = match &self.actual {
            Value::String(text) => Some(text.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::Object(fields) => Some(fields.len()),
            _ => None,
        };
        let pass = length == Some(expected);
        self.verdict(
            pass,
            "toHaveLength",
            format!("{} to have length {expected}", self.actual),
        )
    }

    pub fn to_be_greater_than(self, expected: f64) -> Result<(), TestFailure> {
        let pass = self.actual.as_f64().is_some_and(|actual| actual > expected);
        self.verdict(
            pass,
            "toBeGreaterThan",
            format!("{} to be greater than {expected}", self.actual),
        )
    }

    pub fn to_be_less_than(self, expected: f64) -> Result<(), TestFailure> {
        let pass = self.actual.as_f64().is_some_and(|actual| actual < expected);
        self.verdict(
            pass,
            "toBeLessThan",
            format!("{} to be less than {expected}", self.actual),
        )
    }

    /// Regex match over a string value.
    pub fn to_match(self, pattern: &str) -> Result<(), TestFailure> {
        let regex = match regex::Regex::new(pattern) {
            Ok(regex) => regex,
            Err(_) => {
                return self.fail("toMatch", format!("pattern '{pattern}' is not a valid regex"));
            }
        };
        let pass = self
            .actual
            .as_str()
            .is_some_and(|actual| regex.is_match(actual));
        self.verdict(pass, "toMatch", format!("{} to match /{pattern}/", self.actual))
    }

    fn verdict(
        &self,
        pass: bool,
        matcher: &'static str,
        description: String,
    ) -> Result<(), TestFailure> {
        if pass != self.negated {
            return Ok(());
        }
        let expectation = if self.negated {
            format!("expected not {description}")
        } else {
            format!("expected {description}")
        };
        Err(failure(matcher, expectation, self.location))
    }

    fn fail(&self, matcher: &'static str, message: String) -> Result<(), TestFailure> {
        Err(failure(matcher, message, self.location))
    }
}

/// An expectation over a mock.
pub struct MockExpectation {
    mock: MockFn,
    negated: bool,
    location: ErrorLocation,
}

impl MockExpectation {
    /// Inverts the following matcher.
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn to_have_been_called(self) -> Result<(), TestFailure> {
        let count = self.mock.call_count();
        self.verdict(
            count > 0,
            "toHaveBeenCalled",
            format!("mock '{}' to have been called", self.mock.mock_name()),
        )
    }

    pub fn to_have_been_called_times(self, expected: usize) -> Result<(), TestFailure> {
        let count = self.mock.call_count();
        self.verdict(
            count == expected,
            "toHaveBeenCalledTimes",
            format!(
                "mock '{}' to have been called {expected} time(s), saw {count}",
                self.mock.mock_name()
            ),
        )
    }

    /// Whether any invocation received exactly these arguments.
    pub fn to_have_been_called_with(self, args: &[MockValue]) -> Result<(), TestFailure> {
        let pass = self.mock.calls().iter().any(|call| call.as_slice() == args);
        self.verdict(
            pass,
            "toHaveBeenCalledWith",
            format!("mock '{}' to have been called with {args:?}", self.mock.mock_name()),
        )
    }

    /// Whether the n-th (zero-based) invocation received these arguments.
    pub fn to_have_been_nth_called_with(
        self,
        index: usize,
        args: &[MockValue],
    ) -> Result<(), TestFailure> {
        let pass = self
            .mock
            .nth_call(index)
            .is_some_and(|call| call.as_slice() == args);
        self.verdict(
            pass,
            "toHaveBeenNthCalledWith",
            format!(
                "call #{index} of mock '{}' to have arguments {args:?}",
                self.mock.mock_name()
            ),
        )
    }

    /// Whether any invocation returned (not threw) this value.
    pub fn to_have_returned_with(self, expected: &MockValue) -> Result<(), TestFailure> {
        let pass = self
            .mock
            .results()
            .iter()
            .any(|result| matches!(result, MockResult::Return(value) if value == expected));
        self.verdict(
            pass,
            "toHaveReturnedWith",
            format!(
                "mock '{}' to have returned {expected:?}",
                self.mock.mock_name()
            ),
        )
    }

    fn verdict(
        &self,
        pass: bool,
        matcher: &'static str,
        description: String,
    ) -> Result<(), TestFailure> {
        if pass != self.negated {
            return Ok(());
        }
        let expectation = if self.negated {
            format!("expected not {description}")
        } else {
            format!("expected {description}")
        };
        Err(failure(matcher, expectation, self.location))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(truthy) => *truthy,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn failure(matcher: &'static str, message: String, location: ErrorLocation) -> TestFailure {
    let mut error = kestrel_schema::SerializedError::failing(message, Some(location));
    error
        .extra
        .insert("matcher".to_owned(), serde_json::json!(matcher));
    TestFailure::from_serialized(error)
}

#[track_caller]
fn caller_location() -> ErrorLocation {
    let caller = std::panic::Location::caller();
    ErrorLocation {
        line: caller.line().saturating_sub(1),
        column: caller.column().saturating_sub(1),
    }
}

#[cfg(test)]
mod tests {
    use kestrel_mock::MockRegistry;
    use serde_json::json;

    use super::*;

    #[test]
    fn equality_and_negation() {
        expect_value(json!(4)).to_equal(&json!(4)).unwrap();
        expect_value(json!(4)).not().to_equal(&json!(5)).unwrap();

        let failure = expect_value(json!(4)).to_equal(&json!(5)).unwrap_err();
        assert_eq!(failure.error.name, "Failing");
        assert_eq!(failure.error.message, "expected 4 to equal 5");
        assert_eq!(failure.error.extra["matcher"], "toEqual");
        assert!(failure.error.location.is_some());
    }

    #[test]
    fn truthiness_follows_javascript_rules() {
        expect_value(json!("text")).to_be_truthy().unwrap();
        expect_value(json!(1)).to_be_truthy().unwrap();
        expect_value(json!("")).to_be_falsy().unwrap();
        expect_value(json!(0)).to_be_falsy().unwrap();
        expect_value(json!(null)).to_be_falsy().unwrap();
        expect_value(json!(null)).to_be_null().unwrap();
        expect_value(json!([])).to_be_truthy().unwrap();
    }

    #[test]
    fn containment_and_length() {
        expect_value(json!("credentials")).to_contain(&json!("dent")).unwrap();
        expect_value(json!([1, 2, 3])).to_contain(&json!(2)).unwrap();
        expect_value(json!([1, 2, 3])).to_have_length(3).unwrap();
        expect_value(json!({"a": 1})).to_have_length(1).unwrap();
        assert!(expect_value(json!(42)).to_have_length(2).is_err());
    }

    #[test]
    fn numeric_comparisons_and_regex() {
        expect_value(json!(10)).to_be_greater_than(9.5).unwrap();
        expect_value(json!(10)).to_be_less_than(11.0).unwrap();
        expect_value(json!("user-42")).to_match(r"^user-\d+$").unwrap();
        assert!(expect_value(json!("abc")).to_match("(").is_err());
    }

    #[test]
    fn mock_matchers_read_tracking_state() {
        let registry = MockRegistry::new();
        let mock = registry.mock_fn(None, None, Some("api"));

        expect_mock(&mock).not().to_have_been_called().unwrap();

        mock.call(MockValue::Undefined, vec![MockValue::string("a")]);
        mock.call(MockValue::Undefined, vec![MockValue::string("b")]);

        expect_mock(&mock).to_have_been_called().unwrap();
        expect_mock(&mock).to_have_been_called_times(2).unwrap();
        expect_mock(&mock)
            .to_have_been_called_with(&[MockValue::string("a")])
            .unwrap();
        expect_mock(&mock)
            .to_have_been_nth_called_with(1, &[MockValue::string("b")])
            .unwrap();
        expect_mock(&mock)
            .to_have_returned_with(&MockValue::Undefined)
            .unwrap();

        let failure = expect_mock(&mock)
            .to_have_been_called_times(5)
            .unwrap_err();
        assert!(failure.error.message.contains("saw 2"));
    }
}
