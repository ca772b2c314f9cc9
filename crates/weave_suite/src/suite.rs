use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;
use thiserror::Error;

use weave_flow::{History, Stmt};

use crate::assert::Expectation;

#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("parse suite: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One declarative test record.
///
/// `expect` is polymorphic in the suite document: a string is a text
/// assertion, an array is an event-list assertion. Records without an
/// expectation still run; asserting them fails with `NotAsserted`.
#[derive(Deserialize)]
pub struct TestCase {
    pub name: String,
    pub test: Vec<Stmt>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    expect: Option<RecordedExpect>,
    #[serde(default)]
    pub repeat: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordedExpect {
    Text(String),
    Events(History),
}

impl TestCase {
    /// Effective repeat count; a fresh database handle is expected per
    /// iteration.
    pub fn repeat(&self) -> usize {
        self.repeat.max(1)
    }

    pub fn expectation(&self) -> Option<Expectation> {
        match &self.expect {
            None => None,
            Some(RecordedExpect::Text(s)) => Some(Expectation::Text(s.clone())),
            Some(RecordedExpect::Events(h)) => Some(Expectation::Events(h.clone())),
        }
    }

    pub fn matches_filter(&self, filter: &str) -> bool {
        filter.is_empty() || self.name.contains(filter)
    }
}

/// Load a suite document: a JSON array of test records.
pub fn load_suite<R: Read>(r: R) -> Result<Vec<TestCase>, SuiteError> {
    Ok(serde_json::from_reader(r)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert::AssertError;

    const SUITE: &str = r#"[
        {
            "name": "locks/simple",
            "labels": {"group": "locks"},
            "test": [
                {"s": "a", "q": "/* a */ begin"},
                {"s": "a", "q": "/* a */ select 1", "flags": 1}
            ],
            "expect": "/* a */ begin\n-- a >> 0 rows affected\n",
            "repeat": 3
        },
        {
            "name": "locks/events",
            "test": [
                {"s": "a", "q": "/* a */ select 1", "flags": 1}
            ],
            "expect": [
                {"kind": "Invoke", "session": "a",
                 "stmt": {"s": "a", "q": "/* a */ select 1", "flags": 1}}
            ]
        },
        {
            "name": "bare",
            "test": []
        }
    ]"#;

    #[test]
    fn test_load_suite_shapes() {
        let tests = load_suite(SUITE.as_bytes()).unwrap();
        assert_eq!(tests.len(), 3);

        assert_eq!(tests[0].name, "locks/simple");
        assert_eq!(tests[0].labels["group"], "locks");
        assert_eq!(tests[0].repeat(), 3);
        assert_eq!(tests[0].test.len(), 2);
        assert!(matches!(
            tests[0].expectation(),
            Some(Expectation::Text(_))
        ));

        assert!(matches!(
            tests[1].expectation(),
            Some(Expectation::Events(_))
        ));
        assert_eq!(tests[1].repeat(), 1);

        assert!(tests[2].expectation().is_none());
    }

    #[test]
    fn test_filter_by_substring() {
        let tests = load_suite(SUITE.as_bytes()).unwrap();
        assert!(tests[0].matches_filter(""));
        assert!(tests[0].matches_filter("locks/"));
        assert!(!tests[2].matches_filter("locks/"));
    }

    #[test]
    fn test_missing_expect_is_not_asserted() {
        let tests = load_suite(SUITE.as_bytes()).unwrap();
        let actual = History::default();
        let outcome = match tests[2].expectation() {
            Some(e) => e.assert(&actual),
            None => Err(AssertError::NotAsserted),
        };
        assert!(matches!(outcome, Err(AssertError::NotAsserted)));
    }

    #[test]
    fn test_malformed_suite_fails() {
        assert!(load_suite(&b"{\"not\": \"an array\"}"[..]).is_err());
    }
}
