//! Hierarchy builder - reconstructs the call forest of a trace
//!
//! Calls are indexed into an arena, parent/child edges are resolved by index,
//! and the result is materialized as owned [`CallTree`] values. Referential
//! problems (dangling ids, duplicate claims, cycles) drop the offending edge
//! with a warning; the build itself never fails.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::{Call, CallKind, CallTree, RawRows};
use crate::normalize::normalize;

/// Deepest level a materialized tree may reach; calls nested deeper are
/// promoted to roots of their own.
pub const MAX_TREE_DEPTH: usize = 256;

/// Normalize raw rows and build the call forest
pub fn build_call_forest(rows: &RawRows) -> Vec<CallTree> {
    build_forest(normalize(rows))
}

/// Hierarchy order: start time ascending (unstarted calls last), then id
pub fn compare_calls(a: &Call, b: &Call) -> Ordering {
    a.start_time
        .is_none()
        .cmp(&b.start_time.is_none())
        .then_with(|| a.start_time.cmp(&b.start_time))
        .then_with(|| a.id.cmp(&b.id))
}

/// Build the forest from normalized calls.
///
/// Agent child lists are applied first, so they win over a `parent_id`
/// claim on the same call.
pub fn build_forest(calls: Vec<Call>) -> Vec<CallTree> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(calls.len());
    let mut arena: Vec<Call> = Vec::with_capacity(calls.len());

    for call in calls {
        if index.contains_key(&call.id) {
            warn!(id = %call.id, "Duplicate call id, dropping later record");
            continue;
        }
        index.insert(call.id.clone(), arena.len());
        arena.push(call);
    }

    let mut parent: Vec<Option<usize>> = vec![None; arena.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];

    for (idx, call) in arena.iter().enumerate() {
        if call.kind() != CallKind::Agent {
            continue;
        }
        for child_id in &call.child_ids {
            let Some(&child) = index.get(child_id) else {
                warn!(parent = %call.id, child = %child_id, "Dropping dangling child reference");
                continue;
            };
            if child == idx || !matches!(arena[child].kind(), CallKind::Llm | CallKind::Tool) {
                warn!(parent = %call.id, child = %child_id, "Dropping invalid child reference");
                continue;
            }
            if let Some(owner) = parent[child] {
                debug!(
                    child = %child_id,
                    owner = %arena[owner].id,
                    claimant = %call.id,
                    "Child already claimed"
                );
                continue;
            }
            parent[child] = Some(idx);
            children[idx].push(child);
        }
    }

    for (idx, call) in arena.iter().enumerate() {
        if parent[idx].is_some() {
            continue;
        }
        let Some(parent_id) = call.parent_id.as_deref() else {
            continue;
        };
        match index.get(parent_id) {
            Some(&p) if p != idx => {
                parent[idx] = Some(p);
                children[p].push(idx);
            }
            Some(_) => warn!(id = %call.id, "Ignoring self parent reference"),
            None => warn!(id = %call.id, parent = %parent_id, "Dropping dangling parent reference"),
        }
    }

    let by_hierarchy = |a: &usize, b: &usize| compare_calls(&arena[*a], &arena[*b]);
    for list in &mut children {
        list.sort_by(by_hierarchy);
    }
    let mut pending: Vec<usize> = (0..arena.len()).collect();
    pending.sort_by(|a, b| {
        parent[*a]
            .is_some()
            .cmp(&parent[*b].is_some())
            .then_with(|| by_hierarchy(a, b))
    });

    // Roots first; anything still unvisited afterwards sits on a cycle and
    // is promoted to a root.
    let mut visited = vec![false; arena.len()];
    let mut forest = Vec::new();
    for idx in pending {
        if visited[idx] {
            continue;
        }
        if parent[idx].is_some() {
            warn!(id = %arena[idx].id, "Breaking parent cycle, promoting call to root");
        }
        plant(idx, &arena, &children, &mut visited, &mut forest);
    }
    forest.sort_by(|a, b| compare_calls(&a.call, &b.call));

    debug!(calls = arena.len(), roots = forest.len(), "Built call forest");
    forest
}

/// Materialize the tree rooted at `root`, plus a root for every call cut off
/// by the depth limit
fn plant(
    root: usize,
    arena: &[Call],
    children: &[Vec<usize>],
    visited: &mut [bool],
    forest: &mut Vec<CallTree>,
) {
    let mut queue = vec![root];
    while let Some(idx) = queue.pop() {
        if visited[idx] {
            continue;
        }
        if idx != root {
            warn!(
                id = %arena[idx].id,
                max_depth = MAX_TREE_DEPTH,
                "Call nested too deeply, promoting to root"
            );
        }
        forest.push(materialize(idx, 0, arena, children, visited, &mut queue));
    }
}

fn materialize(
    idx: usize,
    depth: usize,
    arena: &[Call],
    children: &[Vec<usize>],
    visited: &mut [bool],
    deferred: &mut Vec<usize>,
) -> CallTree {
    visited[idx] = true;
    let mut node = CallTree::leaf(arena[idx].clone());

    for &child in &children[idx] {
        if visited[child] {
            warn!(
                parent = %arena[idx].id,
                child = %arena[child].id,
                "Cycle detected, dropping edge"
            );
            continue;
        }
        if depth + 1 >= MAX_TREE_DEPTH {
            deferred.push(child);
            continue;
        }
        node.children.push(materialize(child, depth + 1, arena, children, visited, deferred));
    }

    node
}
