//! Per-test results and the end-of-run summary.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Outcome of one test in one repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
    Todo,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Skip => write!(f, "skip"),
            Self::Todo => write!(f, "todo"),
        }
    }
}

/// Result of running (or deliberately not running) one test.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Full name including the suite path.
    pub name: String,
    pub status: TestStatus,
    /// Body execution time; zero for skipped, todo and hook-gated tests.
    pub duration: Duration,
    /// The classified error for failed tests. May also carry an auxiliary
    /// error on a passing test: a completion callback invoked a second time
    /// is reported against the test whose first invocation already decided
    /// the outcome.
    pub error: Option<EngineError>,
}

/// Detail line for one failed test, kept serializable for result dumps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetail {
    pub name: String,
    pub error: String,
}

/// Aggregated counts over all repetitions of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub todo: usize,
    /// Hook failures observed outside test results (afterAll and the like).
    pub hook_errors: usize,
    pub repetitions: u32,
    pub elapsed_ms: u64,
    /// Assertion-call count supplied by the assertion-library collaborator;
    /// the engine records it verbatim.
    pub assertions: Option<u64>,
    pub failures: Vec<FailureDetail>,
}

impl RunSummary {
    /// Aggregate a summary from per-test results.
    pub fn from_results(
        results: &[RunResult],
        hook_errors: usize,
        repetitions: u32,
        elapsed: Duration,
        assertions: Option<u64>,
    ) -> Self {
        let mut summary = Self {
            passed: 0,
            failed: 0,
            skipped: 0,
            todo: 0,
            hook_errors,
            repetitions,
            elapsed_ms: elapsed.as_millis() as u64,
            assertions,
            failures: Vec::new(),
        };
        for result in results {
            match result.status {
                TestStatus::Pass => summary.passed += 1,
                TestStatus::Fail => {
                    summary.failed += 1;
                    summary.failures.push(FailureDetail {
                        name: result.name.clone(),
                        error: result
                            .error
                            .as_ref()
                            .map(|e| e.to_string())
                            .unwrap_or_default(),
                    });
                }
                TestStatus::Skip => summary.skipped += 1,
                TestStatus::Todo => summary.todo += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.todo
    }

    /// Whether the run is clean: no failed tests and no stray hook errors.
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.hook_errors == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
