//! The suite/test tree.
//!
//! Nodes live in an arena owned by [`TestTree`]; a [`NodeId`] is an index
//! into it. Parent links are plain ids (they never own the parent), children
//! are stored in registration order and are never reordered. The tree is
//! built once during collection and is structurally immutable afterwards;
//! only the per-suite lifecycle flags mutate during execution, and those are
//! reset at the start of every repetition.

use std::time::Duration;

use crate::body::Body;
use crate::error::EngineError;
use crate::hooks::{Hook, HookKind, HookRegistry};

/// Index of a node in a [`TestTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Per-node `only` / `skip` / `todo` markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub only: bool,
    pub skip: bool,
    pub todo: bool,
}

/// Tri-state lifecycle flag for a suite's `beforeAll` / `afterAll`.
///
/// Advances `NotRun -> Running -> Done` exactly once per repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStatus {
    NotRun,
    Running,
    Done,
}

/// How a test entered the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOrigin {
    /// Registered by a suite body.
    Declared,
    /// Synthesized to represent an uncaught error during suite collection.
    CollectionFailure,
}

/// A suite: a named grouping of child nodes plus its hook registry.
#[derive(Debug)]
pub struct SuiteNode {
    pub name: String,
    pub modifiers: Modifiers,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub hooks: HookRegistry,
    pub before_all_status: LifecycleStatus,
    pub after_all_status: LifecycleStatus,
    /// First `beforeAll` failure of this suite in the current repetition;
    /// gates every descendant test.
    pub before_all_failure: Option<EngineError>,
}

/// A test: a named leaf with a body and an optional timeout override.
#[derive(Debug)]
pub struct TestNode {
    pub name: String,
    pub modifiers: Modifiers,
    pub parent: NodeId,
    pub body: Body,
    pub timeout: Option<Duration>,
    /// The body is expected to fail; the reported outcome inverts.
    pub failing: bool,
    pub origin: TestOrigin,
}

/// A node in the tree.
#[derive(Debug)]
pub enum Node {
    Suite(SuiteNode),
    Test(TestNode),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Self::Suite(s) => &s.name,
            Self::Test(t) => &t.name,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            Self::Suite(s) => s.modifiers,
            Self::Test(t) => t.modifiers,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Self::Suite(s) => s.parent,
            Self::Test(t) => Some(t.parent),
        }
    }

    pub fn is_suite(&self) -> bool {
        matches!(self, Self::Suite(_))
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Self::Test(_))
    }
}

/// Arena of suites and tests for one file-run.
#[derive(Debug)]
pub struct TestTree {
    nodes: Vec<Node>,
}

impl TestTree {
    /// Create a tree containing only the unnamed root suite.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Suite(SuiteNode {
                name: String::new(),
                modifiers: Modifiers::default(),
                parent: None,
                children: Vec::new(),
                hooks: HookRegistry::default(),
                before_all_status: LifecycleStatus::NotRun,
                after_all_status: LifecycleStatus::NotRun,
                before_all_failure: None,
            })],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root suite always exists.
        self.nodes.len() <= 1
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// The node as a suite. Panics if `id` names a test; ids are only handed
    /// out by this tree, so a mismatch is a caller bug.
    pub fn suite(&self, id: NodeId) -> &SuiteNode {
        match &self.nodes[id.0] {
            Node::Suite(s) => s,
            Node::Test(t) => panic!("node '{}' is not a suite", t.name),
        }
    }

    pub fn suite_mut(&mut self, id: NodeId) -> &mut SuiteNode {
        match &mut self.nodes[id.0] {
            Node::Suite(s) => s,
            Node::Test(t) => panic!("node '{}' is not a suite", t.name),
        }
    }

    /// The node as a test. Panics if `id` names a suite.
    pub fn test(&self, id: NodeId) -> &TestNode {
        match &self.nodes[id.0] {
            Node::Test(t) => t,
            Node::Suite(s) => panic!("node '{}' is not a test", s.name),
        }
    }

    pub fn test_mut(&mut self, id: NodeId) -> &mut TestNode {
        match &mut self.nodes[id.0] {
            Node::Test(t) => t,
            Node::Suite(s) => panic!("node '{}' is not a test", s.name),
        }
    }

    /// Append a child suite to `parent`.
    pub fn push_suite(&mut self, parent: NodeId, name: &str, modifiers: Modifiers) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::Suite(SuiteNode {
            name: name.to_string(),
            modifiers,
            parent: Some(parent),
            children: Vec::new(),
            hooks: HookRegistry::default(),
            before_all_status: LifecycleStatus::NotRun,
            after_all_status: LifecycleStatus::NotRun,
            before_all_failure: None,
        }));
        self.suite_mut(parent).children.push(id);
        id
    }

    /// Append a test; `test.parent` must already be in this tree.
    pub fn push_test(&mut self, test: TestNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = test.parent;
        self.nodes.push(Node::Test(test));
        self.suite_mut(parent).children.push(id);
        id
    }

    /// Append a hook to `suite`'s registry.
    pub fn push_hook(&mut self, suite: NodeId, kind: HookKind, hook: Hook) {
        self.suite_mut(suite).hooks.push(kind, hook);
    }

    /// Ancestor suites of `id`, outermost first (root included, `id` itself
    /// excluded).
    pub fn suite_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cur = self.node(id).parent();
        while let Some(parent) = cur {
            chain.push(parent);
            cur = self.node(parent).parent();
        }
        chain.reverse();
        chain
    }

    /// Full display name: ancestor names joined with `" > "`, the unnamed
    /// root omitted.
    pub fn full_name(&self, id: NodeId) -> String {
        let mut parts: Vec<&str> = self
            .suite_chain(id)
            .into_iter()
            .map(|a| self.node(a).name())
            .filter(|n| !n.is_empty())
            .collect();
        let own = self.node(id).name();
        if !own.is_empty() {
            parts.push(own);
        }
        parts.join(" > ")
    }

    /// Reset per-repetition lifecycle state on every suite.
    pub fn reset_lifecycle(&mut self) {
        for node in &mut self.nodes {
            if let Node::Suite(suite) = node {
                suite.before_all_status = LifecycleStatus::NotRun;
                suite.after_all_status = LifecycleStatus::NotRun;
                suite.before_all_failure = None;
            }
        }
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}
