//! Only/skip/todo filtering.
//!
//! Filtering is a pure pass over the collected tree, computed once per run
//! before any execution. It never reorders children; it only decides, per
//! node, whether the node is visited and whether its body may run.

use gauntlet_core::{Modifiers, Node, NodeId, TestTree};

/// What the plan decided for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Visit and execute.
    Run,
    /// Visit and report, body never runs.
    Skip,
    /// Visit and report, body never runs.
    Todo,
    /// Not visited at all; absent from results.
    Exclude,
}

/// Inherited suite-level skip/todo mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Skip,
    Todo,
}

/// The filtered view of one tree, indexed by [`NodeId`].
#[derive(Debug)]
pub struct RunPlan {
    dispositions: Vec<Disposition>,
}

impl RunPlan {
    /// Compute the plan for `tree`, optionally narrowing by a substring
    /// filter on full test names.
    pub fn compute(tree: &TestTree, name_filter: Option<&str>) -> Self {
        let mut dispositions = vec![Disposition::Run; tree.len()];

        let any_only = tree.ids().any(|id| tree.node(id).modifiers().only);
        if any_only {
            let mut kept = vec![false; tree.len()];
            narrow(tree, tree.root(), false, &mut kept);
            for id in tree.ids() {
                if !kept[id.index()] {
                    dispositions[id.index()] = Disposition::Exclude;
                }
            }
        }

        cascade(tree, tree.root(), None, &mut dispositions);

        if let Some(pattern) = name_filter {
            for id in tree.ids() {
                if tree.node(id).is_test()
                    && dispositions[id.index()] != Disposition::Exclude
                    && !tree.full_name(id).contains(pattern)
                {
                    dispositions[id.index()] = Disposition::Exclude;
                }
            }
        }

        Self { dispositions }
    }

    pub fn disposition(&self, id: NodeId) -> Disposition {
        self.dispositions[id.index()]
    }

    /// Number of tests the plan will actually execute.
    pub fn runnable_count(&self, tree: &TestTree) -> usize {
        tree.ids()
            .filter(|id| {
                tree.node(*id).is_test() && self.disposition(*id) == Disposition::Run
            })
            .count()
    }
}

/// Mark the kept set under `only` narrowing.
///
/// For a reachable suite: its direct `only` children win if there are any;
/// otherwise, inside an `only` scope every child is kept; otherwise only
/// subtrees that contain an `only` somewhere are descended into.
fn narrow(tree: &TestTree, suite: NodeId, in_only_scope: bool, kept: &mut [bool]) {
    kept[suite.index()] = true;

    let children = &tree.suite(suite).children;
    let direct_only: Vec<NodeId> = children
        .iter()
        .copied()
        .filter(|c| tree.node(*c).modifiers().only)
        .collect();

    let suite_scope = in_only_scope || tree.node(suite).modifiers().only;
    let (selected, child_scope) = if !direct_only.is_empty() {
        (direct_only, true)
    } else if suite_scope {
        (children.clone(), true)
    } else {
        let descend: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|c| tree.node(*c).is_suite() && has_only_descendant(tree, *c))
            .collect();
        (descend, false)
    };

    for child in selected {
        match tree.node(child) {
            Node::Suite(_) => narrow(tree, child, child_scope, kept),
            Node::Test(_) => kept[child.index()] = true,
        }
    }
}

fn has_only_descendant(tree: &TestTree, suite: NodeId) -> bool {
    tree.suite(suite).children.iter().any(|c| {
        let node = tree.node(*c);
        node.modifiers().only || (node.is_suite() && has_only_descendant(tree, *c))
    })
}

/// Apply skip/todo marks, cascading a suite's mark onto every descendant. A
/// node's own mark takes precedence over the inherited one.
fn cascade(
    tree: &TestTree,
    id: NodeId,
    inherited: Option<Mark>,
    dispositions: &mut [Disposition],
) {
    if dispositions[id.index()] == Disposition::Exclude {
        return;
    }
    let mark = own_mark(tree.node(id).modifiers()).or(inherited);
    dispositions[id.index()] = match mark {
        Some(Mark::Skip) => Disposition::Skip,
        Some(Mark::Todo) => Disposition::Todo,
        None => Disposition::Run,
    };
    if let Node::Suite(suite) = tree.node(id) {
        for child in &suite.children {
            cascade(tree, *child, mark, dispositions);
        }
    }
}

fn own_mark(modifiers: Modifiers) -> Option<Mark> {
    if modifiers.skip {
        Some(Mark::Skip)
    } else if modifiers.todo {
        Some(Mark::Todo)
    } else {
        None
    }
}
