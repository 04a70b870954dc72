//! Dependency graph operations (C7, §4.7).
//!
//! There is no separate edge-set structure: every operation here walks the
//! `dependencies: Vec<Dependency>` embedded on each [`Issue`] in the
//! [`IssueStore`]. Per §9's "no dynamic dispatch" note, `DependencyKind` is
//! one flat enum and traversal is plain DFS, not a trait-object graph
//! abstraction.

use std::collections::HashSet;

use crate::error::GraphError;
use crate::id::IssueId;
use crate::model::{Dependency, DependencyKind};
use crate::store::IssueStore;

/// Adds a directed edge `from -> to` of kind `kind` to `from`'s embedded
/// dependency list.
///
/// Rejects `from == to` as [`GraphError::SelfDependency`]. When `kind`
/// participates in cycle checking (`blocks`/`parent_child`), runs a
/// depth-first reachability check from `to` back to `from` restricted to the
/// same kind-subgraph, rejecting as [`GraphError::CycleDetected`] if found
/// (I3).
pub fn add_edge(store: &mut IssueStore, from: &IssueId, to: &IssueId, kind: DependencyKind) -> Result<(), GraphError> {
    if from == to {
        return Err(GraphError::SelfDependency { id: from.clone() });
    }
    if store.get(from).is_none() {
        return Err(GraphError::DependencyNotFound { id: from.clone() });
    }
    if store.get(to).is_none() {
        return Err(GraphError::DependencyNotFound { id: to.clone() });
    }

    if kind.participates_in_cycle_check() {
        if let Some(path) = reachable_path(store, to, from, &kind) {
            let mut full_path = Vec::with_capacity(path.len() + 1);
            full_path.push(from.clone());
            full_path.extend(path);
            return Err(GraphError::CycleDetected(full_path));
        }
    }

    let issue = store.get_mut(from).expect("existence checked above");
    issue.dependencies.push(Dependency {
        from: from.clone(),
        to: to.clone(),
        kind,
    });
    Ok(())
}

/// Removes the `from -> to` edge of kind `kind`, if present.
pub fn remove_edge(store: &mut IssueStore, from: &IssueId, to: &IssueId, kind: &DependencyKind) -> Result<(), GraphError> {
    let issue = store
        .get_mut(from)
        .map_err(|_| GraphError::DependencyNotFound { id: from.clone() })?;
    issue.dependencies.retain(|d| !(&d.to == to && &d.kind == kind));
    Ok(())
}

/// Targets of `id`'s outgoing `blocks` edges.
#[must_use]
pub fn blockers(store: &IssueStore, id: &IssueId) -> Vec<IssueId> {
    store
        .get(id)
        .map(|issue| {
            issue
                .dependencies
                .iter()
                .filter(|d| d.kind == DependencyKind::Blocks)
                .map(|d| d.to.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Every issue with an edge whose `to` is `id`, regardless of kind.
#[must_use]
pub fn dependents(store: &IssueStore, id: &IssueId) -> Vec<IssueId> {
    store.dependents_of(id).map(|(issue, _)| issue.id.clone()).collect()
}

/// DFS search for a path `start -> ... -> target` over edges of `kind`,
/// restricted to the kind-subgraph. Returns the path (inclusive of both
/// endpoints) if reachable.
fn reachable_path(store: &IssueStore, start: &IssueId, target: &IssueId, kind: &DependencyKind) -> Option<Vec<IssueId>> {
    let mut visited = HashSet::new();
    let mut stack = vec![vec![start.clone()]];

    while let Some(path) = stack.pop() {
        let current = path.last().expect("path is never empty");
        if current == target {
            return Some(path);
        }
        if !visited.insert(current.clone()) {
            continue;
        }
        if let Some(issue) = store.get(current) {
            for dep in &issue.dependencies {
                if &dep.kind == kind && !visited.contains(&dep.to) {
                    let mut next = path.clone();
                    next.push(dep.to.clone());
                    stack.push(next);
                }
            }
        }
    }
    None
}

/// Global DFS over the blocks/parent_child subgraph, returning every
/// fundamental cycle found (diagnostic use, §4.7).
#[must_use]
pub fn detect_cycles(store: &IssueStore) -> Vec<Vec<IssueId>> {
    let mut cycles = Vec::new();
    let mut globally_visited = HashSet::new();

    for issue in store.all() {
        if globally_visited.contains(&issue.id) {
            continue;
        }
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();
        walk_for_cycles(store, &issue.id, &mut stack, &mut on_stack, &mut globally_visited, &mut cycles);
    }
    cycles
}

fn walk_for_cycles(
    store: &IssueStore,
    id: &IssueId,
    stack: &mut Vec<IssueId>,
    on_stack: &mut HashSet<IssueId>,
    globally_visited: &mut HashSet<IssueId>,
    cycles: &mut Vec<Vec<IssueId>>,
) {
    stack.push(id.clone());
    on_stack.insert(id.clone());
    globally_visited.insert(id.clone());

    if let Some(issue) = store.get(id) {
        for dep in &issue.dependencies {
            if !dep.kind.participates_in_cycle_check() {
                continue;
            }
            if on_stack.contains(&dep.to) {
                if let Some(start) = stack.iter().position(|x| x == &dep.to) {
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(dep.to.clone());
                    cycles.push(cycle);
                }
            } else if !globally_visited.contains(&dep.to) {
                walk_for_cycles(store, &dep.to, stack, on_stack, globally_visited, cycles);
            }
        }
    }

    stack.pop();
    on_stack.remove(id);
}

/// A node in the tree produced by [`tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// This node's issue id.
    pub id: IssueId,
    /// True if this id was already seen on the current path (and is
    /// therefore not expanded further — displayed as "↻").
    pub is_cycle: bool,
    /// Children, empty when `is_cycle` is true or `max_depth` was reached.
    pub children: Vec<TreeNode>,
}

/// Builds a labeled tree rooted at `id` by following outgoing `blocks` and
/// `parent_child` edges, down to `max_depth` levels. A node that revisits an
/// ancestor on the current path is marked `is_cycle` and not expanded.
#[must_use]
pub fn tree(store: &IssueStore, id: &IssueId, max_depth: usize) -> TreeNode {
    let mut path = HashSet::new();
    build_tree(store, id, max_depth, &mut path)
}

fn build_tree(store: &IssueStore, id: &IssueId, remaining_depth: usize, path: &mut HashSet<IssueId>) -> TreeNode {
    if path.contains(id) {
        return TreeNode { id: id.clone(), is_cycle: true, children: Vec::new() };
    }
    if remaining_depth == 0 {
        return TreeNode { id: id.clone(), is_cycle: false, children: Vec::new() };
    }

    path.insert(id.clone());
    let children = store
        .get(id)
        .map(|issue| {
            issue
                .dependencies
                .iter()
                .filter(|d| d.kind.participates_in_cycle_check())
                .map(|d| build_tree(store, &d.to, remaining_depth - 1, path))
                .collect()
        })
        .unwrap_or_default();
    path.remove(id);

    TreeNode { id: id.clone(), is_cycle: false, children }
}
