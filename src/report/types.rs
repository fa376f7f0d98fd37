use serde::{Deserialize, Serialize};

use crate::driver::common::iso_timestamp;

/// Outcome of one test action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_name: String,
    pub timestamp: String,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub html_dumps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Scenario this action ran under (scenario mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl TestResult {
    /// Start a result stamped with the current time. `success` stays false
    /// until `finish` is called.
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            timestamp: iso_timestamp(),
            success: false,
            errors: Vec::new(),
            warnings: Vec::new(),
            screenshots: Vec::new(),
            html_dumps: Vec::new(),
            data: None,
            scenario: None,
            duration_ms: None,
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Settle the success flag: a result passes iff it recorded no errors
    pub fn finish(mut self) -> Self {
        self.success = self.errors.is_empty();
        self
    }
}

/// Aggregate over all results of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub timestamp: String,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub total_screenshots: usize,
    pub results: Vec<TestResult>,
}

impl TestReport {
    pub fn from_results(results: Vec<TestResult>) -> Self {
        let passed_tests = results.iter().filter(|r| r.success).count();
        Self {
            timestamp: iso_timestamp(),
            total_tests: results.len(),
            passed_tests,
            failed_tests: results.len() - passed_tests,
            total_errors: results.iter().map(|r| r.errors.len()).sum(),
            total_warnings: results.iter().map(|r| r.warnings.len()).sum(),
            total_screenshots: results.iter().map(|r| r.screenshots.len()).sum(),
            results,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn all_passed(&self) -> bool {
        self.failed_tests == 0
    }

    /// Percentage of passing results, 0 for an empty report
    pub fn pass_rate(&self) -> u32 {
        if self.total_tests == 0 {
            0
        } else {
            (self.passed_tests as f64 / self.total_tests as f64 * 100.0) as u32
        }
    }
}
