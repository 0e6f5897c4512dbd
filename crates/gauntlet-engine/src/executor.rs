//! Execution phase: depth-first, pre-order walk of the filtered tree.
//!
//! One executor instance exclusively owns the tree and the per-suite
//! lifecycle flags for the duration of a pass; execution is strictly
//! sequential, so no two bodies (or a hook and a body) ever run
//! concurrently and no locking is needed.

use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use tokio::time::Instant;

use gauntlet_core::{
    DoneMisuse, EngineError, HookKind, LifecycleStatus, NodeId, Reporter, RunResult, TestOrigin,
    TestStatus, TestTree,
};

use crate::collect::Shared;
use crate::filter::{Disposition, RunPlan};
use crate::invoke::{self, InvokeError, Settled};

/// Outcome of invoking one test body.
struct BodyOutcome {
    result: Result<(), EngineError>,
    /// Auxiliary misuse detected after the first completion already decided
    /// the outcome (a second invocation of the done callback).
    aux: Option<EngineError>,
}

pub(crate) struct Executor<'a> {
    tree: &'a mut TestTree,
    plan: &'a RunPlan,
    shared: &'a Rc<Shared>,
    default_timeout: Duration,
    reporter: &'a mut dyn Reporter,
    pub(crate) results: Vec<RunResult>,
    pub(crate) hook_errors: usize,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(
        tree: &'a mut TestTree,
        plan: &'a RunPlan,
        shared: &'a Rc<Shared>,
        default_timeout: Duration,
        reporter: &'a mut dyn Reporter,
    ) -> Self {
        Self {
            tree,
            plan,
            shared,
            default_timeout,
            reporter,
            results: Vec::new(),
            hook_errors: 0,
        }
    }

    /// Run one full pass over the filtered tree.
    pub(crate) async fn run_pass(&mut self) {
        let root = self.tree.root();
        self.run_suite(root, true).await;
    }

    fn run_suite(&mut self, id: NodeId, is_root: bool) -> LocalBoxFuture<'_, ()> {
        Box::pin(async move {
            if self.plan.disposition(id) == Disposition::Exclude {
                return;
            }
            if !is_root {
                let name = self.tree.suite(id).name.clone();
                self.reporter.suite_enter(&name);
            }

            let children = self.tree.suite(id).children.clone();
            for child in children {
                if self.tree.node(child).is_suite() {
                    self.run_suite(child, false).await;
                } else {
                    self.run_test(child).await;
                }
            }

            self.finish_suite(id).await;

            if !is_root {
                let name = self.tree.suite(id).name.clone();
                self.reporter.suite_leave(&name);
            }
        })
    }

    /// Run the suite's `afterAll` hooks, but only if the suite was actually
    /// set up in this repetition and exactly once.
    async fn finish_suite(&mut self, id: NodeId) {
        if self.tree.suite(id).before_all_status == LifecycleStatus::NotRun {
            return;
        }
        if self.tree.suite(id).after_all_status != LifecycleStatus::NotRun {
            return;
        }
        self.tree.suite_mut(id).after_all_status = LifecycleStatus::Running;
        self.run_hook_list(id, HookKind::AfterAll, false).await;
        self.tree.suite_mut(id).after_all_status = LifecycleStatus::Done;
    }

    async fn run_test(&mut self, id: NodeId) {
        let disposition = self.plan.disposition(id);
        if disposition == Disposition::Exclude {
            return;
        }
        let name = self.tree.full_name(id);
        self.reporter.test_start(&name);

        match disposition {
            Disposition::Skip => {
                self.emit_result(name, TestStatus::Skip, Duration::ZERO, None);
                return;
            }
            Disposition::Todo => {
                self.emit_result(name, TestStatus::Todo, Duration::ZERO, None);
                return;
            }
            Disposition::Run | Disposition::Exclude => {}
        }
        tracing::trace!(test = %name, "running test");

        // Lazily run gating beforeAll hooks, outermost suite first. A
        // beforeAll failure fails this test without ever invoking its body.
        if let Some(gate_error) = self.ensure_before_all(id).await {
            self.emit_result(name, TestStatus::Fail, Duration::ZERO, Some(gate_error));
            self.drain_out_of_phase();
            return;
        }

        // beforeEach chains, outer to inner. On the first failure the
        // remaining hooks of this phase are skipped, but teardown still runs
        // for every scope whose setup phase had begun.
        let chain = self.tree.suite_chain(id);
        let mut entered = 0usize;
        let mut setup_error = None;
        for (i, suite) in chain.iter().enumerate() {
            entered = i + 1;
            if let Some(err) = self.run_hook_list(*suite, HookKind::BeforeEach, true).await {
                setup_error = Some(err);
                break;
            }
        }

        let started = Instant::now();
        let (mut status, mut error, aux) = match setup_error {
            Some(err) => (TestStatus::Fail, Some(err), None),
            None => {
                let outcome = self.run_body(id).await;
                let failing = self.tree.test(id).failing;
                match (outcome.result, failing) {
                    (Ok(()), false) => (TestStatus::Pass, None, outcome.aux),
                    (Err(err), false) => (TestStatus::Fail, Some(err), outcome.aux),
                    (Ok(()), true) => (
                        TestStatus::Fail,
                        Some(EngineError::TestBody {
                            source: "expected the body to fail, but it passed".into(),
                        }),
                        outcome.aux,
                    ),
                    (Err(_), true) => (TestStatus::Pass, None, outcome.aux),
                }
            }
        };
        let duration = started.elapsed();

        // afterEach chains, inner to outer, over every entered scope. A
        // teardown failure marks the test failed but never skips the
        // remaining teardown hooks.
        for suite in chain[..entered].iter().rev() {
            if let Some(err) = self.run_hook_list(*suite, HookKind::AfterEach, false).await
                && status != TestStatus::Fail
            {
                status = TestStatus::Fail;
                error = Some(err);
            }
        }

        // Registration attempts made while this test ran.
        if let Some(err) = self.drain_out_of_phase()
            && status != TestStatus::Fail
        {
            status = TestStatus::Fail;
            error = Some(err);
        }

        if error.is_none() {
            error = aux;
        }
        self.emit_result(name, status, duration, error);
    }

    /// Advance every not-yet-run `beforeAll` on the ancestor chain, outer to
    /// inner, and return the outermost gating failure if any suite's setup
    /// failed (now or earlier in this repetition).
    async fn ensure_before_all(&mut self, test: NodeId) -> Option<EngineError> {
        let chain = self.tree.suite_chain(test);
        for suite in chain {
            if self.tree.suite(suite).before_all_status == LifecycleStatus::NotRun {
                self.tree.suite_mut(suite).before_all_status = LifecycleStatus::Running;
                let err = self.run_hook_list(suite, HookKind::BeforeAll, true).await;
                self.tree.suite_mut(suite).before_all_status = LifecycleStatus::Done;
                if let Some(err) = err {
                    self.tree.suite_mut(suite).before_all_failure = Some(err);
                }
            }
            if let Some(err) = &self.tree.suite(suite).before_all_failure {
                return Some(err.clone());
            }
        }
        None
    }

    /// Run one suite's hooks of `kind` in registration order.
    ///
    /// Every failure is emitted as a hook-error event. With `stop_on_error`
    /// (the before phases) the first failure also skips the rest of the
    /// list; the after phases always run every hook. Returns the first
    /// failure.
    async fn run_hook_list(
        &mut self,
        suite: NodeId,
        kind: HookKind,
        stop_on_error: bool,
    ) -> Option<EngineError> {
        let count = self.tree.suite(suite).hooks.len(kind);
        if count == 0 {
            return None;
        }
        let scope = self.scope_label(suite);
        let mut first_error = None;

        for index in 0..count {
            let (invocation, limit) = {
                let Some(hook) = self.tree.suite_mut(suite).hooks.get_mut(kind, index) else {
                    break;
                };
                let limit = hook.timeout.unwrap_or(self.default_timeout);
                (hook.body.begin(), limit)
            };
            let settled = invoke::settle(invocation, limit).await;
            if let Err(invoke_error) = settled.result {
                let err = hook_error(invoke_error, &scope, kind);
                tracing::debug!(scope = %scope, kind = %kind, error = %err, "hook failed");
                self.reporter.hook_error(&scope, kind, &err);
                self.hook_errors += 1;
                if first_error.is_none() {
                    first_error = Some(err);
                }
                if stop_on_error {
                    break;
                }
            }
        }
        first_error
    }

    async fn run_body(&mut self, id: NodeId) -> BodyOutcome {
        let (invocation, limit) = {
            let test = self.tree.test_mut(id);
            let limit = test.timeout.unwrap_or(self.default_timeout);
            (test.body.begin(), limit)
        };
        let Settled {
            result,
            extra_done_calls,
        } = invoke::settle(invocation, limit).await;

        let result = result.map_err(|invoke_error| match invoke_error {
            InvokeError::Failed(source) => match &self.tree.test(id).origin {
                TestOrigin::CollectionFailure => EngineError::Collection {
                    suite: self.scope_label(self.tree.test(id).parent),
                    source,
                },
                TestOrigin::Declared => EngineError::TestBody { source },
            },
            InvokeError::Timeout(limit) => EngineError::Timeout { limit },
            InvokeError::Misuse(misuse) => EngineError::DoneCallbackMisuse(misuse),
        });

        let aux =
            (extra_done_calls > 0).then(|| EngineError::DoneCallbackMisuse(DoneMisuse::CalledTwice));
        BodyOutcome { result, aux }
    }

    fn drain_out_of_phase(&mut self) -> Option<EngineError> {
        let mut stray = self.shared.out_of_phase.borrow_mut();
        if stray.is_empty() {
            return None;
        }
        let first = stray.remove(0);
        stray.clear();
        Some(first)
    }

    fn scope_label(&self, suite: NodeId) -> String {
        let name = self.tree.full_name(suite);
        if name.is_empty() { "<root>".to_string() } else { name }
    }

    fn emit_result(
        &mut self,
        name: String,
        status: TestStatus,
        duration: Duration,
        error: Option<EngineError>,
    ) {
        let result = RunResult {
            name,
            status,
            duration,
            error,
        };
        self.reporter.test_result(&result);
        self.results.push(result);
    }
}

fn hook_error(invoke_error: InvokeError, scope: &str, kind: HookKind) -> EngineError {
    match invoke_error {
        InvokeError::Failed(source) => EngineError::Hook {
            scope: scope.to_string(),
            kind,
            source,
        },
        InvokeError::Timeout(limit) => EngineError::Timeout { limit },
        InvokeError::Misuse(misuse) => EngineError::DoneCallbackMisuse(misuse),
    }
}
