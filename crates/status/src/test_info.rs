use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestResult {
    Negative,
    Positive,
    Invalid,
}

/// A test outcome delivered to the resident
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInfo {
    pub result: TestResult,
    pub date: DateTime<Utc>,
}

impl TestInfo {
    pub fn new(result: TestResult, date: DateTime<Utc>) -> Self {
        Self { result, date }
    }
}
