//! Materializing snapshots into the store.

use dephealth_core::{AlertRecord, NodeId, NodeRecord, Snapshot};
use std::collections::HashMap;

use super::model::{AlertSeverity, AlertSummary, EdgeData, EdgeId, GraphModel, NodeData, NodeKind};
use crate::grouping::{dimension_value, CompoundElements, GroupingDimension};

/// Sorted node ids and `source->target` pairs. Two snapshots with equal
/// signatures differ only in attributes and can be patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureSignature {
    nodes: Vec<NodeId>,
    edges: Vec<(NodeId, NodeId)>,
}

pub fn structure_signature(snapshot: &Snapshot) -> StructureSignature {
    let mut nodes: Vec<NodeId> = snapshot.nodes.iter().map(|n| n.id.clone()).collect();
    nodes.sort();
    nodes.dedup();
    let mut edges: Vec<(NodeId, NodeId)> = snapshot
        .edges
        .iter()
        .map(|e| (e.source.clone(), e.target.clone()))
        .collect();
    edges.sort();
    edges.dedup();
    StructureSignature { nodes, edges }
}

/// Active alerts per service: count and worst severity.
pub fn alert_summaries(alerts: &[AlertRecord]) -> HashMap<NodeId, AlertSummary> {
    let mut out: HashMap<NodeId, AlertSummary> = HashMap::new();
    for alert in alerts {
        out.entry(alert.service.clone())
            .or_default()
            .record(AlertSeverity::from_label(&alert.severity));
    }
    out
}

fn node_kind(record: &NodeRecord) -> NodeKind {
    if record.is_service() {
        NodeKind::Service
    } else {
        NodeKind::Dependency {
            dep_type: record.node_type.clone(),
        }
    }
}

/// Replaces the whole store with `snapshot`. Group placeholders and parent
/// links are added when `compound` is given.
pub fn rebuild(
    model: &mut GraphModel,
    snapshot: &Snapshot,
    dimension: GroupingDimension,
    compound: Option<&CompoundElements>,
) {
    let alerts = alert_summaries(&snapshot.alerts);
    model.batch(|m| {
        m.clear();
        if let Some(compound) = compound {
            for parent in &compound.parents {
                m.upsert_node(parent.clone());
            }
        }

        for record in &snapshot.nodes {
            let mut node = NodeData::new(
                record.id.clone(),
                record.label.clone(),
                node_kind(record),
                record.state,
            );
            node.dimension = dimension_value(record, dimension);
            node.parent = compound.and_then(|c| c.parent_map.get(&record.id).cloned());
            node.alerts = alerts.get(&record.id).cloned().unwrap_or_default();
            m.upsert_node(node);
        }

        let mut skipped = 0usize;
        for record in &snapshot.edges {
            let mut edge = EdgeData::new(
                record.source.clone(),
                record.target.clone(),
                record.state,
                record.critical,
            );
            edge.status = record.status.clone();
            edge.latency = record.latency.clone();
            if !m.upsert_edge(edge) {
                skipped += 1;
            }
        }

        tracing::debug!(
            nodes = m.node_count(),
            edges = m.edge_count(),
            skipped,
            "store rebuilt"
        );
    });
}

/// Updates attributes of existing elements without touching structure.
pub fn patch(model: &mut GraphModel, snapshot: &Snapshot) {
    let alerts = alert_summaries(&snapshot.alerts);
    model.batch(|m| {
        for record in &snapshot.nodes {
            if let Some(node) = m.node_mut(&record.id) {
                node.state = record.state;
                node.label = record.label.clone();
                node.alerts = alerts.get(&record.id).cloned().unwrap_or_default();
            }
        }
        for record in &snapshot.edges {
            let id = EdgeId::raw(record.source.clone(), record.target.clone());
            if let Some(edge) = m.edge_mut(&id) {
                edge.state = record.state;
                edge.critical = record.critical;
                edge.status = record.status.clone();
                edge.latency = record.latency.clone();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::fixtures::id;
    use crate::grouping::{placeholder_id, GroupingEngine, GroupingPrefs};
    use dephealth_core::HealthState;

    fn snapshot(json: &str) -> Snapshot {
        serde_json::from_str(json).expect("snapshot")
    }

    fn sample() -> Snapshot {
        snapshot(
            r#"{
                "nodes": [
                    {"id": "api", "label": "api", "state": "ok", "type": "service", "namespace": "shop"},
                    {"id": "pg", "label": "pg.data.svc:5432", "state": "down", "type": "postgres"}
                ],
                "edges": [
                    {"source": "api", "target": "pg", "state": "down", "critical": true, "status": "timeout"},
                    {"source": "api", "target": "ghost", "state": "ok"}
                ],
                "alerts": [
                    {"service": "api", "severity": "warning"},
                    {"service": "api", "dependency": "pg", "severity": "critical"}
                ]
            }"#,
        )
    }

    #[test]
    fn signature_ignores_attributes_and_order() {
        let a = sample();
        let mut b = sample();
        b.nodes.reverse();
        b.nodes[0].state = HealthState::Ok;
        b.edges[0].status = None;
        assert_eq!(structure_signature(&a), structure_signature(&b));

        b.edges.pop();
        assert_ne!(structure_signature(&a), structure_signature(&b));
    }

    #[test]
    fn alerts_count_and_keep_worst_severity() {
        let summaries = alert_summaries(&sample().alerts);
        let api = summaries.get(&id("api")).expect("api alerts");
        assert_eq!(api.count, 2);
        assert_eq!(api.severity, Some(AlertSeverity::Critical));
        assert!(!summaries.contains_key(&id("pg")));
    }

    #[test]
    fn rebuild_materializes_nodes_edges_and_parents() {
        let snap = sample();
        let grouping = GroupingEngine::new(GroupingPrefs {
            enabled: true,
            ..GroupingPrefs::default()
        });
        let compound = grouping.build_compound_elements(&snap);
        let mut model = GraphModel::default();
        let before = model.revision();

        rebuild(&mut model, &snap, grouping.dimension(), Some(&compound));

        assert_eq!(model.revision(), before + 1);
        // two placeholders plus two nodes; the dangling edge is skipped
        assert_eq!(model.node_count(), 4);
        assert_eq!(model.edge_count(), 1);
        let pg = model.node(&id("pg")).expect("pg");
        assert_eq!(pg.dep_type(), Some("postgres"));
        assert_eq!(pg.dimension.as_deref(), Some("data"));
        assert_eq!(pg.parent, Some(placeholder_id("data")));
        let edge = model.edge(&EdgeId::raw(id("api"), id("pg"))).expect("edge");
        assert!(edge.critical);
        assert_eq!(edge.status.as_deref(), Some("timeout"));
        assert_eq!(model.node(&id("api")).expect("api").alerts.count, 2);
    }

    #[test]
    fn rebuild_without_grouping_has_no_parents() {
        let mut model = GraphModel::default();
        rebuild(&mut model, &sample(), GroupingDimension::Namespace, None);
        assert_eq!(model.node_count(), 2);
        let api = model.node(&id("api")).expect("api");
        assert_eq!(api.parent, None);
        assert_eq!(api.dimension.as_deref(), Some("shop"));
    }

    #[test]
    fn patch_updates_attributes_in_place() {
        let mut model = GraphModel::default();
        rebuild(&mut model, &sample(), GroupingDimension::Namespace, None);

        let mut next = sample();
        next.nodes[1].state = HealthState::Ok;
        next.edges[0].state = HealthState::Ok;
        next.edges[0].status = Some("ok".to_string());
        next.alerts.clear();
        patch(&mut model, &next);

        assert_eq!(model.node(&id("pg")).expect("pg").state, HealthState::Ok);
        let edge = model.edge(&EdgeId::raw(id("api"), id("pg"))).expect("edge");
        assert_eq!(edge.state, HealthState::Ok);
        assert_eq!(edge.status.as_deref(), Some("ok"));
        assert_eq!(model.node(&id("api")).expect("api").alerts.count, 0);
        assert_eq!(model.node_count(), 2);
    }
}
