//! The reporter interface.
//!
//! The executor emits events in execution order; formatting, colorization
//! and persistence belong to reporter implementations, not to the engine.
//! [`MemoryReporter`] records the raw stream and is what the engine's own
//! tests assert against.

use crate::error::EngineError;
use crate::hooks::HookKind;
use crate::result::{RunResult, RunSummary, TestStatus};

/// Consumer of the engine's result-event stream.
///
/// All methods default to no-ops so a reporter only implements what it
/// cares about. Suite events carry the suite's own name; test events carry
/// the full `outer > inner > test` path.
pub trait Reporter {
    fn suite_enter(&mut self, _name: &str) {}
    fn suite_leave(&mut self, _name: &str) {}
    fn test_start(&mut self, _name: &str) {}
    fn test_result(&mut self, _result: &RunResult) {}
    fn hook_error(&mut self, _scope: &str, _kind: HookKind, _error: &EngineError) {}
    fn summary(&mut self, _summary: &RunSummary) {}
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {}

/// One recorded reporter event.
#[derive(Debug, Clone)]
pub enum ReporterEvent {
    SuiteEnter(String),
    SuiteLeave(String),
    TestStart(String),
    TestResult(RunResult),
    HookError {
        scope: String,
        kind: HookKind,
        error: EngineError,
    },
    Summary(RunSummary),
}

/// Records the full event stream in order.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    pub events: Vec<ReporterEvent>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded test results, in emission order.
    pub fn results(&self) -> Vec<&RunResult> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReporterEvent::TestResult(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// `(full name, status)` pairs for every recorded result.
    pub fn statuses(&self) -> Vec<(String, TestStatus)> {
        self.results()
            .into_iter()
            .map(|r| (r.name.clone(), r.status))
            .collect()
    }

    /// The result with the given full name, if any repetition produced one.
    pub fn result_named(&self, name: &str) -> Option<&RunResult> {
        self.results().into_iter().find(|r| r.name == name)
    }

    pub fn hook_errors(&self) -> Vec<(&str, HookKind, &EngineError)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReporterEvent::HookError { scope, kind, error } => {
                    Some((scope.as_str(), *kind, error))
                }
                _ => None,
            })
            .collect()
    }

    /// Compact one-line rendering of each event, for order assertions.
    pub fn trace(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|e| match e {
                ReporterEvent::SuiteEnter(n) => format!("enter {n}"),
                ReporterEvent::SuiteLeave(n) => format!("leave {n}"),
                ReporterEvent::TestStart(n) => format!("start {n}"),
                ReporterEvent::TestResult(r) => format!("result {} {}", r.name, r.status),
                ReporterEvent::HookError { scope, kind, .. } => {
                    format!("hook-error {scope} {kind}")
                }
                ReporterEvent::Summary(s) => format!("summary {}", s.total()),
            })
            .collect()
    }
}

impl Reporter for MemoryReporter {
    fn suite_enter(&mut self, name: &str) {
        self.events.push(ReporterEvent::SuiteEnter(name.to_string()));
    }

    fn suite_leave(&mut self, name: &str) {
        self.events.push(ReporterEvent::SuiteLeave(name.to_string()));
    }

    fn test_start(&mut self, name: &str) {
        self.events.push(ReporterEvent::TestStart(name.to_string()));
    }

    fn test_result(&mut self, result: &RunResult) {
        self.events.push(ReporterEvent::TestResult(result.clone()));
    }

    fn hook_error(&mut self, scope: &str, kind: HookKind, error: &EngineError) {
        self.events.push(ReporterEvent::HookError {
            scope: scope.to_string(),
            kind,
            error: error.clone(),
        });
    }

    fn summary(&mut self, summary: &RunSummary) {
        self.events.push(ReporterEvent::Summary(summary.clone()));
    }
}
