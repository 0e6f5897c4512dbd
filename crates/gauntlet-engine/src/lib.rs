//! Hierarchical test scheduler and executor.
//!
//! The engine collects nested suite/test declarations in one synchronous
//! pass, applies only/skip/todo filtering, runs lifecycle hooks in
//! outer-to-inner / inner-to-outer order, executes bodies (sync, async or
//! callback-shaped) under per-item timeouts, and can repeat the whole
//! filtered run N times with independent hook lifecycles.
//!
//! ```
//! use gauntlet_core::{Body, MemoryReporter};
//! use gauntlet_engine::{Engine, EngineConfig};
//!
//! let engine = Engine::collect(EngineConfig::default(), |t| {
//!     t.describe("math", |t| {
//!         t.test("adds", Body::sync(|| assert_eq!(2 + 2, 4)));
//!         t.test_skip("divides by zero", Body::sync(|| {}));
//!     });
//! });
//!
//! let mut reporter = MemoryReporter::new();
//! let summary = engine.run_blocking(&mut reporter).unwrap();
//! assert_eq!(summary.passed, 1);
//! assert_eq!(summary.skipped, 1);
//! ```
//!
//! Execution is single-threaded and strictly sequential per engine
//! instance; cross-file parallelism belongs to an outer layer. Timeouts are
//! cooperative: they cancel the wait for a body at its suspension points,
//! never the synchronous code inside it.

mod collect;
mod config;
mod engine;
mod executor;
mod filter;
mod invoke;

pub use collect::{COLLECTION_FAILURE_NAME, Collector, Phase, SuiteOutcome};
pub use config::{ConfigError, DEFAULT_TIMEOUT_MS, EngineConfig};
pub use engine::Engine;
pub use filter::{Disposition, RunPlan};
