//! The engine: collection entry point and the repeat controller.

use std::rc::Rc;

use gauntlet_core::{Reporter, RunSummary};
use tokio::time::Instant;

use crate::collect::{Collector, Phase, Shared, SuiteOutcome};
use crate::config::EngineConfig;
use crate::executor::Executor;
use crate::filter::RunPlan;

/// One engine instance per file-run.
///
/// `collect` runs the file body synchronously to build the tree; [`run`]
/// filters it once and executes it `repeat` times, each repetition with an
/// independent hook lifecycle. The engine is consumed by the run: the tree
/// never persists across runs.
///
/// [`run`]: Engine::run
pub struct Engine {
    shared: Rc<Shared>,
    config: EngineConfig,
    assertions: Option<Box<dyn Fn() -> u64>>,
}

impl Engine {
    /// Build the suite tree by running `body` synchronously.
    ///
    /// The [`Collector`] handle is only valid for registration while this
    /// call is on the stack; clones kept around afterwards get their
    /// registration attempts rejected.
    pub fn collect<R: SuiteOutcome>(
        config: EngineConfig,
        body: impl FnOnce(&Collector) -> R,
    ) -> Self {
        let shared = Shared::new();
        let collector = Collector::new(Rc::clone(&shared));
        tracing::debug!("collection started");
        collector.collect_root(body);
        tracing::debug!("collection finished");
        Self {
            shared,
            config,
            assertions: None,
        }
    }

    /// Supply the assertion-call counter read into the final summary. The
    /// count comes from the assertion-library collaborator; the engine
    /// records it verbatim.
    pub fn with_assertion_counter(mut self, counter: impl Fn() -> u64 + 'static) -> Self {
        self.assertions = Some(Box::new(counter));
        self
    }

    /// Filter once, then execute the whole tree `repeat` times sequentially.
    ///
    /// Must be driven on a current-thread runtime: execution is strictly
    /// sequential and body futures are not `Send`. The run always completes
    /// and reports a summary, whatever individual items do.
    pub async fn run(self, reporter: &mut dyn Reporter) -> RunSummary {
        self.shared.phase.set(Phase::Filtering);
        let mut tree = self
            .shared
            .collect
            .borrow_mut()
            .tree
            .take()
            .unwrap_or_default();
        let plan = RunPlan::compute(&tree, self.config.filter.as_deref());
        tracing::debug!(
            nodes = tree.len(),
            runnable = plan.runnable_count(&tree),
            "run plan computed"
        );

        let started = Instant::now();
        let repetitions = self.config.repeat.max(1);
        let mut results = Vec::new();
        let mut hook_errors = 0;

        self.shared.phase.set(Phase::Executing);
        for repetition in 1..=repetitions {
            // Each repetition is an independent lifecycle: beforeAll and
            // afterAll fire once per repetition, not once per run.
            tree.reset_lifecycle();
            tracing::debug!(repetition, "execution pass started");
            let mut executor = Executor::new(
                &mut tree,
                &plan,
                &self.shared,
                self.config.default_timeout(),
                reporter,
            );
            executor.run_pass().await;
            results.extend(executor.results);
            hook_errors += executor.hook_errors;
        }
        self.shared.phase.set(Phase::Done);

        let assertions = self.assertions.as_ref().map(|count| count());
        let summary = RunSummary::from_results(
            &results,
            hook_errors,
            repetitions,
            started.elapsed(),
            assertions,
        );
        reporter.summary(&summary);
        summary
    }

    /// Convenience wrapper: build a current-thread runtime and block on
    /// [`Engine::run`].
    pub fn run_blocking(self, reporter: &mut dyn Reporter) -> std::io::Result<RunSummary> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        Ok(runtime.block_on(self.run(reporter)))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("phase", &self.shared.phase.get())
            .field("config", &self.config)
            .finish()
    }
}
