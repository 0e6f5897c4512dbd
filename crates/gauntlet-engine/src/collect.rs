//! Collection phase: registration calls build the suite tree.
//!
//! The "current scope" stack is not process-global. It lives in a [`Shared`]
//! state owned by one engine instance and threaded to suite bodies through
//! the [`Collector`] handle, so concurrent or repeated runs never share
//! mutable state. Which phase the engine is in is an explicit enum, consulted
//! by every registration call; registering from inside a running test body is
//! rejected with a tagged error, never silently mis-scheduled.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::time::Duration;

use gauntlet_core::{
    Body, EngineError, Failure, Hook, HookKind, IntoBodyResult, Modifiers, NodeId,
    RegistrationKind, TestNode, TestOrigin, TestTree,
};

/// Name given to the synthetic failing test appended to a suite whose body
/// threw mid-collection.
pub const COLLECTION_FAILURE_NAME: &str = "uncaught error during collection";

/// Engine lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Filtering,
    Executing,
    Done,
}

/// Return type accepted from suite bodies: `()` or `Result<(), _>`.
pub trait SuiteOutcome {
    fn into_result(self) -> Result<(), Failure>;
}

impl SuiteOutcome for () {
    fn into_result(self) -> Result<(), Failure> {
        Ok(())
    }
}

impl<E: Into<Failure>> SuiteOutcome for Result<(), E> {
    fn into_result(self) -> Result<(), Failure> {
        self.map_err(Into::into)
    }
}

pub(crate) struct CollectState {
    /// Taken by the engine when execution starts.
    pub(crate) tree: Option<TestTree>,
    /// Current scope stack; the root suite is always at the bottom.
    scopes: Vec<NodeId>,
}

/// State shared between the engine and every [`Collector`] clone.
pub(crate) struct Shared {
    pub(crate) phase: Cell<Phase>,
    /// Out-of-phase registration errors, drained into the result of the
    /// currently executing test.
    pub(crate) out_of_phase: RefCell<Vec<EngineError>>,
    pub(crate) collect: RefCell<CollectState>,
}

impl Shared {
    pub(crate) fn new() -> Rc<Self> {
        let tree = TestTree::new();
        let root = tree.root();
        Rc::new(Self {
            phase: Cell::new(Phase::Collecting),
            out_of_phase: RefCell::new(Vec::new()),
            collect: RefCell::new(CollectState {
                tree: Some(tree),
                scopes: vec![root],
            }),
        })
    }
}

/// Registration handle passed to suite bodies.
///
/// Cloning is cheap; a clone captured by a test body still sees the engine's
/// phase and gets its registration attempts rejected once collection is
/// over.
#[derive(Clone)]
pub struct Collector {
    pub(crate) shared: Rc<Shared>,
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("phase", &self.shared.phase.get())
            .finish()
    }
}

impl Collector {
    pub(crate) fn new(shared: Rc<Shared>) -> Self {
        Self { shared }
    }

    /// The engine's current phase.
    pub fn phase(&self) -> Phase {
        self.shared.phase.get()
    }

    fn reject_out_of_phase(&self, what: RegistrationKind) -> EngineError {
        let err = EngineError::RegistrationOutOfPhase { what };
        tracing::warn!(%err, "registration rejected");
        self.shared.out_of_phase.borrow_mut().push(err.clone());
        err
    }

    // ------------------------------------------------------------------
    // Suites
    // ------------------------------------------------------------------

    /// Register a nested suite. `body` runs synchronously, immediately, so
    /// nested registrations attach to it before this call returns.
    pub fn describe<R: SuiteOutcome>(&self, name: &str, body: impl FnOnce(&Collector) -> R) {
        self.describe_with(name, Modifiers::default(), body);
    }

    pub fn describe_only<R: SuiteOutcome>(&self, name: &str, body: impl FnOnce(&Collector) -> R) {
        self.describe_with(name, Modifiers { only: true, ..Modifiers::default() }, body);
    }

    pub fn describe_skip<R: SuiteOutcome>(&self, name: &str, body: impl FnOnce(&Collector) -> R) {
        self.describe_with(name, Modifiers { skip: true, ..Modifiers::default() }, body);
    }

    pub fn describe_todo<R: SuiteOutcome>(&self, name: &str, body: impl FnOnce(&Collector) -> R) {
        self.describe_with(name, Modifiers { todo: true, ..Modifiers::default() }, body);
    }

    /// Register a nested suite with explicit modifiers.
    ///
    /// If the body throws (panics or returns an error), children registered
    /// before the throw point stay in the tree and one synthetic failing
    /// test carrying the caught error is appended to this suite; sibling
    /// suites are unaffected.
    pub fn describe_with<R: SuiteOutcome>(
        &self,
        name: &str,
        modifiers: Modifiers,
        body: impl FnOnce(&Collector) -> R,
    ) {
        if self.phase() != Phase::Collecting {
            self.reject_out_of_phase(RegistrationKind::Suite);
            return;
        }
        let id = {
            let mut st = self.shared.collect.borrow_mut();
            let Some(parent) = st.scopes.last().copied() else {
                return;
            };
            let Some(tree) = st.tree.as_mut() else {
                return;
            };
            let id = tree.push_suite(parent, name, modifiers);
            st.scopes.push(id);
            id
        };

        // The borrow is released while the body runs: nested registrations
        // re-borrow through this same handle.
        let outcome = catch_unwind(AssertUnwindSafe(|| body(self)));

        let mut st = self.shared.collect.borrow_mut();
        st.scopes.pop();
        let failure = match outcome {
            Ok(r) => r.into_result().err(),
            Err(payload) => Some(Failure::from_panic(payload)),
        };
        if let Some(failure) = failure {
            tracing::debug!(suite = name, error = %failure, "suite body threw during collection");
            if let Some(tree) = st.tree.as_mut() {
                tree.push_test(TestNode {
                    name: COLLECTION_FAILURE_NAME.to_string(),
                    modifiers: Modifiers::default(),
                    parent: id,
                    body: Body::sync(move || Err(failure.clone())),
                    timeout: None,
                    failing: false,
                    origin: TestOrigin::CollectionFailure,
                });
            }
        }
    }

    /// Run the top-level file body against the root suite, with the same
    /// failure containment as [`Collector::describe_with`].
    pub(crate) fn collect_root<R: SuiteOutcome>(&self, body: impl FnOnce(&Collector) -> R) {
        let outcome = catch_unwind(AssertUnwindSafe(|| body(self)));
        let failure = match outcome {
            Ok(r) => r.into_result().err(),
            Err(payload) => Some(Failure::from_panic(payload)),
        };
        if let Some(failure) = failure {
            tracing::debug!(error = %failure, "top-level body threw during collection");
            let mut st = self.shared.collect.borrow_mut();
            if let Some(tree) = st.tree.as_mut() {
                let root = tree.root();
                tree.push_test(TestNode {
                    name: COLLECTION_FAILURE_NAME.to_string(),
                    modifiers: Modifiers::default(),
                    parent: root,
                    body: Body::sync(move || Err(failure.clone())),
                    timeout: None,
                    failing: false,
                    origin: TestOrigin::CollectionFailure,
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    /// Register a test, reporting phase violations to the caller.
    pub fn try_test(&self, name: &str, body: Body) -> Result<(), EngineError> {
        self.register_test(name, Modifiers::default(), None, false, body)
    }

    pub fn test(&self, name: &str, body: Body) {
        let _ = self.try_test(name, body);
    }

    pub fn test_only(&self, name: &str, body: Body) {
        let _ = self.register_test(
            name,
            Modifiers { only: true, ..Modifiers::default() },
            None,
            false,
            body,
        );
    }

    pub fn test_skip(&self, name: &str, body: Body) {
        let _ = self.register_test(
            name,
            Modifiers { skip: true, ..Modifiers::default() },
            None,
            false,
            body,
        );
    }

    pub fn test_todo(&self, name: &str, body: Body) {
        let _ = self.register_test(
            name,
            Modifiers { todo: true, ..Modifiers::default() },
            None,
            false,
            body,
        );
    }

    /// `test_skip` when `condition` holds, plain `test` otherwise.
    pub fn test_skip_if(&self, condition: bool, name: &str, body: Body) {
        if condition {
            self.test_skip(name, body);
        } else {
            self.test(name, body);
        }
    }

    /// `test_todo` when `condition` holds, plain `test` otherwise.
    pub fn test_todo_if(&self, condition: bool, name: &str, body: Body) {
        if condition {
            self.test_todo(name, body);
        } else {
            self.test(name, body);
        }
    }

    /// Register a test whose body is expected to fail; the reported outcome
    /// inverts.
    pub fn test_failing(&self, name: &str, body: Body) {
        let _ = self.register_test(name, Modifiers::default(), None, true, body);
    }

    /// Register a test with a per-test timeout override.
    pub fn test_with_timeout(&self, name: &str, timeout: Duration, body: Body) {
        let _ = self.register_test(name, Modifiers::default(), Some(timeout), false, body);
    }

    /// Register a test with explicit modifiers and timeout.
    pub fn test_with(&self, name: &str, modifiers: Modifiers, timeout: Option<Duration>, body: Body) {
        let _ = self.register_test(name, modifiers, timeout, false, body);
    }

    /// Register one synchronous test per table row; the row value is
    /// formatted into the test name.
    pub fn test_each<T, I, F, R>(&self, label: &str, cases: I, body: F)
    where
        T: fmt::Debug + 'static,
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> R + Clone + 'static,
        R: IntoBodyResult,
    {
        for case in cases {
            let name = format!("{label} [{case:?}]");
            let f = body.clone();
            let _ = self.register_test(
                &name,
                Modifiers::default(),
                None,
                false,
                Body::sync(move || f(&case)),
            );
        }
    }

    fn register_test(
        &self,
        name: &str,
        modifiers: Modifiers,
        timeout: Option<Duration>,
        failing: bool,
        body: Body,
    ) -> Result<(), EngineError> {
        if self.phase() != Phase::Collecting {
            return Err(self.reject_out_of_phase(RegistrationKind::Test));
        }
        let mut st = self.shared.collect.borrow_mut();
        let Some(parent) = st.scopes.last().copied() else {
            return Err(self.reject_out_of_phase(RegistrationKind::Test));
        };
        let Some(tree) = st.tree.as_mut() else {
            return Err(self.reject_out_of_phase(RegistrationKind::Test));
        };
        tree.push_test(TestNode {
            name: name.to_string(),
            modifiers,
            parent,
            body,
            timeout,
            failing,
            origin: TestOrigin::Declared,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hooks
    // ------------------------------------------------------------------

    /// Register a hook on the current scope, reporting phase violations to
    /// the caller.
    pub fn try_hook(&self, kind: HookKind, hook: Hook) -> Result<(), EngineError> {
        if self.phase() != Phase::Collecting {
            return Err(self.reject_out_of_phase(RegistrationKind::Hook));
        }
        let mut st = self.shared.collect.borrow_mut();
        let Some(scope) = st.scopes.last().copied() else {
            return Err(self.reject_out_of_phase(RegistrationKind::Hook));
        };
        let Some(tree) = st.tree.as_mut() else {
            return Err(self.reject_out_of_phase(RegistrationKind::Hook));
        };
        tree.push_hook(scope, kind, hook);
        Ok(())
    }

    pub fn before_all(&self, body: Body) {
        let _ = self.try_hook(HookKind::BeforeAll, Hook::new(body));
    }

    pub fn before_each(&self, body: Body) {
        let _ = self.try_hook(HookKind::BeforeEach, Hook::new(body));
    }

    pub fn after_each(&self, body: Body) {
        let _ = self.try_hook(HookKind::AfterEach, Hook::new(body));
    }

    pub fn after_all(&self, body: Body) {
        let _ = self.try_hook(HookKind::AfterAll, Hook::new(body));
    }

    pub fn before_all_with_timeout(&self, body: Body, timeout: Duration) {
        let _ = self.try_hook(HookKind::BeforeAll, Hook::with_timeout(body, timeout));
    }

    pub fn before_each_with_timeout(&self, body: Body, timeout: Duration) {
        let _ = self.try_hook(HookKind::BeforeEach, Hook::with_timeout(body, timeout));
    }

    pub fn after_each_with_timeout(&self, body: Body, timeout: Duration) {
        let _ = self.try_hook(HookKind::AfterEach, Hook::with_timeout(body, timeout));
    }

    pub fn after_all_with_timeout(&self, body: Body, timeout: Duration) {
        let _ = self.try_hook(HookKind::AfterAll, Hook::with_timeout(body, timeout));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::Node;

    fn collect(body: impl FnOnce(&Collector)) -> TestTree {
        let shared = Shared::new();
        let collector = Collector::new(Rc::clone(&shared));
        collector.collect_root(body);
        shared
            .collect
            .borrow_mut()
            .tree
            .take()
            .expect("tree taken twice")
    }

    #[test]
    fn test_nested_describe_attaches_to_current_scope() {
        let tree = collect(|c| {
            c.describe("outer", |c| {
                c.describe("inner", |c| {
                    c.test("leaf", Body::sync(|| {}));
                });
                c.test("sibling", Body::sync(|| {}));
            });
        });

        let root = tree.root();
        let outer = tree.suite(root).children[0];
        let inner = tree.suite(outer).children[0];
        assert_eq!(tree.full_name(inner), "outer > inner");
        assert_eq!(tree.suite(outer).children.len(), 2);
        assert_eq!(tree.suite(inner).children.len(), 1);
    }

    #[test]
    fn test_describe_panic_keeps_prior_children_and_appends_synthetic() {
        let tree = collect(|c| {
            c.describe("broken", |c| -> () {
                c.test("before-throw", Body::sync(|| {}));
                panic!("setup exploded");
            });
            c.describe("healthy", |c| {
                c.test("fine", Body::sync(|| {}));
            });
        });

        let root = tree.root();
        assert_eq!(tree.suite(root).children.len(), 2);
        let broken = tree.suite(root).children[0];
        let children = &tree.suite(broken).children;
        assert_eq!(children.len(), 2);
        assert_eq!(tree.node(children[0]).name(), "before-throw");
        let synthetic = tree.test(children[1]);
        assert_eq!(synthetic.name, COLLECTION_FAILURE_NAME);
        assert_eq!(synthetic.origin, TestOrigin::CollectionFailure);
    }

    #[test]
    fn test_describe_error_return_is_contained() {
        let tree = collect(|c| {
            c.describe("errs", |_c| -> Result<(), Failure> {
                Err(Failure::new("bad fixture"))
            });
        });
        let root = tree.root();
        let errs = tree.suite(root).children[0];
        let children = &tree.suite(errs).children;
        assert_eq!(children.len(), 1);
        assert_eq!(tree.node(children[0]).name(), COLLECTION_FAILURE_NAME);
    }

    #[test]
    fn test_registration_rejected_outside_collecting() {
        let shared = Shared::new();
        let collector = Collector::new(Rc::clone(&shared));
        shared.phase.set(Phase::Executing);

        let err = collector
            .try_test("late", Body::sync(|| {}))
            .expect_err("registration should be rejected");
        assert_eq!(
            err,
            EngineError::RegistrationOutOfPhase {
                what: RegistrationKind::Test
            }
        );
        let err = collector
            .try_hook(HookKind::BeforeEach, Hook::new(Body::sync(|| {})))
            .expect_err("hook registration should be rejected");
        assert_eq!(
            err,
            EngineError::RegistrationOutOfPhase {
                what: RegistrationKind::Hook
            }
        );
        assert_eq!(shared.out_of_phase.borrow().len(), 2);
    }

    #[test]
    fn test_test_each_registers_one_test_per_row() {
        let tree = collect(|c| {
            c.test_each("squares", [1i32, 2, 3], |n| {
                assert_eq!(n * n, n * n);
            });
        });
        let root = tree.root();
        let names: Vec<&str> = tree
            .suite(root)
            .children
            .iter()
            .map(|id| tree.node(*id).name())
            .collect();
        assert_eq!(names, vec!["squares [1]", "squares [2]", "squares [3]"]);
    }

    #[test]
    fn test_conditional_modifiers() {
        let tree = collect(|c| {
            c.test_skip_if(true, "skipped", Body::sync(|| {}));
            c.test_skip_if(false, "kept", Body::sync(|| {}));
            c.test_todo_if(true, "pending", Body::sync(|| {}));
        });
        let root = tree.root();
        let children = tree.suite(root).children.clone();
        assert!(tree.node(children[0]).modifiers().skip);
        assert_eq!(tree.node(children[1]).modifiers(), Modifiers::default());
        assert!(tree.node(children[2]).modifiers().todo);
    }

    #[test]
    fn test_hooks_attach_to_current_scope() {
        let tree = collect(|c| {
            c.before_each(Body::sync(|| {}));
            c.describe("scoped", |c| {
                c.after_all(Body::sync(|| {}));
                c.test("x", Body::sync(|| {}));
            });
        });
        let root = tree.root();
        assert_eq!(tree.suite(root).hooks.len(HookKind::BeforeEach), 1);
        let scoped = tree.suite(root).children[0];
        assert_eq!(tree.suite(scoped).hooks.len(HookKind::AfterAll), 1);
        assert_eq!(tree.suite(scoped).hooks.len(HookKind::BeforeEach), 0);
    }

    #[test]
    fn test_collection_error_in_one_suite_spares_siblings() {
        let tree = collect(|c| {
            c.describe("a", |c| c.test("a1", Body::sync(|| {})));
            c.describe("b", |_c| -> () { panic!("mid-collection") });
            c.describe("d", |c| c.test("d1", Body::sync(|| {})));
        });
        let root = tree.root();
        let children = tree.suite(root).children.clone();
        assert_eq!(children.len(), 3);
        for id in children {
            assert!(matches!(tree.node(id), Node::Suite(_)));
        }
    }
}
