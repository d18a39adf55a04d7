//! Ordered (input, expected) test suites for the engine.
//!
//! A suite on disk is a JSON array of pairs. The expected value is either a
//! string, compared for exact equality, or `{"pattern": "<regex>"}`,
//! searched for anywhere in the output:
//!
//! ```json
//! [
//!   ["(car '(a b c))", "A"],
//!   ["(gensym)", {"pattern": "^G[0-9]+$"}]
//! ]
//! ```

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, RuntimeError};

/// What a test step's output must look like.
#[derive(Debug, Clone)]
pub enum Expectation {
    /// Output equals this text.
    Exact(String),
    /// Output matches this pattern.
    Pattern(Regex),
}

impl Expectation {
    pub fn pattern(source: &str) -> Result<Self> {
        Regex::new(source)
            .map(Expectation::Pattern)
            .map_err(|e| RuntimeError::Suite(e.to_string()))
    }

    pub fn matches(&self, output: &str) -> bool {
        match self {
            Expectation::Exact(text) => text == output,
            Expectation::Pattern(re) => re.is_match(output),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Exact(text) => f.write_str(text),
            Expectation::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for Expectation {
    fn from(text: &str) -> Self {
        Expectation::Exact(text.to_string())
    }
}

/// One step of a suite.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub input: String,
    pub expected: Expectation,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected: impl Into<Expectation>) -> Self {
        Self {
            input: input.into(),
            expected: expected.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawExpectation {
    Exact(String),
    Pattern { pattern: String },
}

/// An ordered list of test cases.
#[derive(Debug, Clone, Default)]
pub struct Suite {
    cases: Vec<TestCase>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, case: TestCase) {
        self.cases.push(case);
    }

    pub fn get(&self, index: usize) -> Option<&TestCase> {
        self.cases.get(index)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter()
    }

    /// Parse a suite from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<(String, RawExpectation)> =
            serde_json::from_str(json).map_err(|e| RuntimeError::Suite(e.to_string()))?;
        let cases = raw
            .into_iter()
            .map(|(input, expected)| {
                let expected = match expected {
                    RawExpectation::Exact(text) => Expectation::Exact(text),
                    RawExpectation::Pattern { pattern } => Expectation::pattern(&pattern)?,
                };
                Ok(TestCase { input, expected })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { cases })
    }

    /// Load a suite from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl FromIterator<TestCase> for Suite {
    fn from_iter<I: IntoIterator<Item = TestCase>>(iter: I) -> Self {
        Self {
            cases: iter.into_iter().collect(),
        }
    }
}
