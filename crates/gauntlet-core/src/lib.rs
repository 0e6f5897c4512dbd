//! Core data model for the gauntlet test execution engine.
//!
//! This crate holds everything the engine crate schedules over: the
//! suite/test tree ([`tree`]), body descriptors in their three shapes
//! ([`body`]), the per-suite hook registry ([`hooks`]), run results and
//! summaries ([`result`]), the error taxonomy ([`error`]) and the reporter
//! interface ([`reporter`]). It contains no scheduling logic of its own.

pub mod body;
pub mod error;
pub mod hooks;
pub mod reporter;
pub mod result;
pub mod tree;

pub use body::{Body, BodyFuture, BodyResult, BodyShape, Done, DoneWait, IntoBodyResult, Invocation};
pub use error::{DoneMisuse, EngineError, Failure, RegistrationKind};
pub use hooks::{Hook, HookKind, HookRegistry};
pub use reporter::{MemoryReporter, NullReporter, Reporter, ReporterEvent};
pub use result::{FailureDetail, RunResult, RunSummary, TestStatus};
pub use tree::{LifecycleStatus, Modifiers, Node, NodeId, SuiteNode, TestNode, TestOrigin, TestTree};
