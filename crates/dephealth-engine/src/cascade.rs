//! Cascading-failure attribution.
//!
//! Every `down` node is traced downstream along critical edges to the
//! dependency that actually explains it, then upstream along critical edges
//! to mark every service that depends on it with that root cause.

use dephealth_core::{HealthState, NodeId};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::graph::model::{CascadeMark, GraphModel, NodeData};

/// Recomputes `cascade` annotations on every node in one batch.
///
/// Idempotent: the result depends only on node states and critical edges.
pub fn compute_cascade_warnings(model: &mut GraphModel) {
    let mut down: Vec<NodeId> = model
        .nodes()
        .filter(|n| n.state == HealthState::Down && !n.is_group())
        .map(|n| n.id.clone())
        .collect();
    down.sort();

    let mut sources: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
    let mut chain: HashSet<NodeId> = HashSet::new();

    for down_id in &down {
        let roots = find_root_causes(model, down_id, &mut chain);
        for affected in upstream_of(model, down_id) {
            let entry = sources.entry(affected.clone()).or_default();
            entry.extend(roots.iter().filter(|r| **r != affected).cloned());
        }
    }

    tracing::debug!(
        down = down.len(),
        affected = sources.values().filter(|s| !s.is_empty()).count(),
        chain = chain.len(),
        "cascade pass"
    );

    model.batch(|m| {
        for node in m.nodes_mut() {
            let sources = sources.remove(&node.id).unwrap_or_default();
            node.cascade = CascadeMark {
                count: sources.len(),
                sources,
                in_chain: chain.contains(&node.id),
            };
        }
    });
}

fn failing_node<'a>(model: &'a GraphModel, target: &NodeId) -> Option<&'a NodeData> {
    model
        .node(target)
        .filter(|n| matches!(n.state, HealthState::Down | HealthState::Unknown))
}

/// Breadth-first walk downstream from a down node. A down service is a transit
/// point; any other down or unknown node reached is a terminal root cause.
/// Falls back to the down node itself when nothing downstream explains it.
fn find_root_causes(
    model: &GraphModel,
    down_id: &NodeId,
    chain: &mut HashSet<NodeId>,
) -> Vec<NodeId> {
    let mut roots = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::from([down_id.clone()]);
    let mut queue: VecDeque<NodeId> = VecDeque::from([down_id.clone()]);
    chain.insert(down_id.clone());

    while let Some(cur) = queue.pop_front() {
        for edge in model.outgoers(&cur).filter(|e| e.critical) {
            let target_id = edge.target();
            if visited.contains(target_id) {
                continue;
            }
            let Some(target) = failing_node(model, target_id) else {
                continue;
            };
            visited.insert(target_id.clone());
            chain.insert(target_id.clone());

            if target.is_service() && target.state == HealthState::Down {
                queue.push_back(target_id.clone());
            } else {
                roots.push(target_id.clone());
            }
        }
    }

    if roots.is_empty() {
        roots.push(down_id.clone());
    }
    roots
}

/// Nodes reachable upstream through critical edges. A down node stops the
/// walk: it explains itself and is not marked.
fn upstream_of(model: &GraphModel, down_id: &NodeId) -> Vec<NodeId> {
    let mut affected = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::from([down_id.clone()]);

    while let Some(cur) = queue.pop_front() {
        for edge in model.incomers(&cur).filter(|e| e.critical) {
            let source_id = edge.source();
            if !visited.insert(source_id.clone()) {
                continue;
            }
            let Some(source) = model.node(source_id) else {
                continue;
            };
            if source.state == HealthState::Down {
                continue;
            }
            affected.push(source_id.clone());
            queue.push_back(source_id.clone());
        }
    }
    affected
}
