//! Compound groups by namespace or group tag, with collapse/expand.
//!
//! Collapsing a group removes its children and every edge touching them from
//! the store, keeps exact copies in a [`CollapsedGroup`] record, and turns the
//! placeholder into a summary node. Cross-group edges are redirected onto the
//! placeholder as aggregated edges that remember the raw edges they replace,
//! so nested collapses always flatten back to raw edges.

use dephealth_core::{HealthState, NodeId, NodeRecord, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::graph::model::{
    Aggregate, AlertSummary, EdgeData, EdgeId, GraphModel, GroupInfo, NodeData, NodeKind,
};
use crate::namespace::namespace_from_host;

pub const GROUP_PREFIX: &str = "ns::";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingDimension {
    #[default]
    Namespace,
    Group,
}

impl GroupingDimension {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "namespace" => Some(Self::Namespace),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

/// Persisted grouping preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingPrefs {
    pub enabled: bool,
    pub dimension: GroupingDimension,
    pub collapsed: Vec<String>,
}

pub fn placeholder_id(name: &str) -> NodeId {
    NodeId(format!("{GROUP_PREFIX}{name}"))
}

/// Grouping value of a snapshot node under `dim`. In the namespace dimension
/// dependencies without an explicit namespace fall back to their host label.
pub fn dimension_value(record: &NodeRecord, dim: GroupingDimension) -> Option<String> {
    let value = match dim {
        GroupingDimension::Group => record.group.clone(),
        GroupingDimension::Namespace => record.namespace.clone().or_else(|| {
            if record.is_service() {
                None
            } else {
                namespace_from_host(&record.label)
            }
        }),
    };
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default)]
pub struct CompoundElements {
    pub parents: Vec<NodeData>,
    pub parent_map: HashMap<NodeId, NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedGroup {
    pub children: Vec<NodeData>,
    // raw edges only, sorted by id
    pub edges: Vec<EdgeData>,
}

#[derive(Debug, Default)]
pub struct GroupingEngine {
    enabled: bool,
    dimension: GroupingDimension,
    collapsed: BTreeSet<String>,
    records: HashMap<String, CollapsedGroup>,
    // child id -> name of the collapsed group holding it
    hidden: HashMap<NodeId, String>,
}

impl GroupingEngine {
    pub fn new(prefs: GroupingPrefs) -> Self {
        Self {
            enabled: prefs.enabled,
            dimension: prefs.dimension,
            collapsed: prefs.collapsed.into_iter().collect(),
            records: HashMap::new(),
            hidden: HashMap::new(),
        }
    }

    pub fn prefs(&self) -> GroupingPrefs {
        GroupingPrefs {
            enabled: self.enabled,
            dimension: self.dimension,
            collapsed: self.collapsed.iter().cloned().collect(),
        }
    }

    // ----- Mode -----
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dimension(&self) -> GroupingDimension {
        self.dimension
    }

    pub fn set_grouping_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.drop_records();
        }
    }

    /// Switching dimension forgets every collapse: group names built under
    /// one dimension mean nothing under the other. Returns whether it changed.
    pub fn set_grouping_dimension(&mut self, dimension: GroupingDimension) -> bool {
        if self.dimension == dimension {
            return false;
        }
        self.dimension = dimension;
        self.drop_records();
        self.collapsed.clear();
        true
    }

    // ----- Queries -----
    pub fn collapsed_groups(&self) -> &BTreeSet<String> {
        &self.collapsed
    }

    pub fn is_collapsed(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn collapsed_children(&self, name: &str) -> Option<&[NodeData]> {
        self.records.get(name).map(|r| r.children.as_slice())
    }

    /// Group currently hiding `id`, if any.
    pub fn hidden_in(&self, id: &NodeId) -> Option<&str> {
        self.hidden.get(id).map(String::as_str)
    }

    /// Raw edges leaving a hidden child, as kept in its group's record.
    pub fn stored_edges_from<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a EdgeData> + 'a {
        self.hidden_in(id)
            .and_then(|name| self.records.get(name))
            .into_iter()
            .flat_map(|record| record.edges.iter())
            .filter(move |e| e.source() == id)
    }

    pub fn has_expanded_groups(&self, model: &GraphModel) -> bool {
        model
            .nodes()
            .any(|n| n.group().map(|g| !g.collapsed).unwrap_or(false))
    }

    /// The cached child of a collapsed group that `external` is connected to,
    /// or the sole child when no stored edge says.
    pub fn connected_child(&self, name: &str, external: &NodeId) -> Option<NodeId> {
        let record = self.records.get(name)?;
        let is_child = |id: &NodeId| record.children.iter().any(|c| c.id == *id);
        for edge in &record.edges {
            if edge.source() == external && is_child(edge.target()) {
                return Some(edge.target().clone());
            }
            if edge.target() == external && is_child(edge.source()) {
                return Some(edge.source().clone());
            }
        }
        match record.children.as_slice() {
            [only] => Some(only.id.clone()),
            _ => None,
        }
    }

    // ----- Compound construction -----
    pub fn build_compound_elements(&self, snapshot: &Snapshot) -> CompoundElements {
        let mut groups: BTreeSet<String> = BTreeSet::new();
        let mut parent_map = HashMap::new();
        for record in &snapshot.nodes {
            if let Some(value) = dimension_value(record, self.dimension) {
                parent_map.insert(record.id.clone(), placeholder_id(&value));
                groups.insert(value);
            }
        }

        let parents = groups
            .into_iter()
            .map(|name| {
                NodeData::new(
                    placeholder_id(&name),
                    name.clone(),
                    NodeKind::Group(GroupInfo {
                        name,
                        collapsed: false,
                        child_count: 0,
                    }),
                    HealthState::Ok,
                )
            })
            .collect();

        CompoundElements {
            parents,
            parent_map,
        }
    }

    // ----- Collapse / expand -----
    /// Collapses an expanded group with at least one child into a summary
    /// node. Returns `false` (and changes nothing) otherwise.
    pub fn collapse_group(&mut self, model: &mut GraphModel, name: &str) -> bool {
        if self.records.contains_key(name) {
            return false;
        }
        let parent_id = placeholder_id(name);
        match model.node(&parent_id) {
            Some(n) if n.is_group() && !n.is_collapsed_group() => {}
            _ => {
                tracing::debug!(group = name, "collapse skipped: no expanded group");
                return false;
            }
        }
        let child_ids = model.children(&parent_id);
        if child_ids.is_empty() {
            return false;
        }

        model.batch(|m| {
            let mut stored: BTreeMap<EdgeId, EdgeData> = BTreeMap::new();
            let mut children = Vec::with_capacity(child_ids.len());
            for cid in &child_ids {
                let Some((node, removed)) = m.remove_node(cid) else {
                    continue;
                };
                for mut edge in removed {
                    match edge.aggregate.take() {
                        Some(agg) => {
                            stored.extend(agg.members.into_iter().map(|e| (e.id.clone(), e)));
                        }
                        None => {
                            stored.insert(edge.id.clone(), edge);
                        }
                    }
                }
                children.push(node);
            }

            let mut alerts = AlertSummary::default();
            for child in &children {
                alerts.merge(&child.alerts);
            }
            let state = HealthState::worst_of(children.iter().map(|c| c.state));
            if let Some(parent) = m.node_mut(&parent_id) {
                parent.kind = NodeKind::Group(GroupInfo {
                    name: name.to_string(),
                    collapsed: true,
                    child_count: children.len(),
                });
                parent.state = state;
                parent.alerts = alerts;
                parent.label = format!("{name} ({})", children.len());
            }

            for child in &children {
                self.hidden.insert(child.id.clone(), name.to_string());
            }

            // Internal edges resolve to a self-loop on the placeholder and
            // are dropped here.
            for edge in stored.values() {
                let (Some(src), Some(tgt)) = (
                    self.resolve_endpoint(m, edge.source()),
                    self.resolve_endpoint(m, edge.target()),
                ) else {
                    continue;
                };
                if src != tgt {
                    merge_into_aggregate(m, src, tgt, edge.clone());
                }
            }

            tracing::debug!(
                group = name,
                children = children.len(),
                edges = stored.len(),
                "group collapsed"
            );
            self.records.insert(
                name.to_string(),
                CollapsedGroup {
                    children,
                    edges: stored.into_values().collect(),
                },
            );
        });

        self.collapsed.insert(name.to_string());
        true
    }

    /// Restores a collapsed group from its record. Stored edges whose other
    /// endpoint now sits in another collapsed group are redirected onto that
    /// group's placeholder; edges whose endpoint is gone are dropped.
    pub fn expand_group(&mut self, model: &mut GraphModel, name: &str) -> bool {
        let parent_id = placeholder_id(name);
        if !model.contains_node(&parent_id) {
            return false;
        }
        let Some(record) = self.records.remove(name) else {
            return false;
        };
        for child in &record.children {
            self.hidden.remove(&child.id);
        }
        self.collapsed.remove(name);

        model.batch(|m| {
            let aggregated: Vec<EdgeId> = m
                .edges_for_node(&parent_id)
                .filter(|e| e.is_aggregated())
                .map(|e| e.id.clone())
                .collect();
            for id in &aggregated {
                m.remove_edge(id);
            }

            if let Some(parent) = m.node_mut(&parent_id) {
                parent.kind = NodeKind::Group(GroupInfo {
                    name: name.to_string(),
                    collapsed: false,
                    child_count: 0,
                });
                parent.label = name.to_string();
                parent.state = HealthState::Ok;
                parent.alerts = AlertSummary::default();
            }

            for mut child in record.children {
                child.parent = Some(parent_id.clone());
                m.upsert_node(child);
            }

            let mut dropped = 0usize;
            for edge in record.edges {
                let (Some(src), Some(tgt)) = (
                    self.resolve_endpoint(m, edge.source()),
                    self.resolve_endpoint(m, edge.target()),
                ) else {
                    dropped += 1;
                    continue;
                };
                if src == tgt {
                    continue;
                }
                if src == *edge.source() && tgt == *edge.target() {
                    m.upsert_edge(edge);
                } else {
                    merge_into_aggregate(m, src, tgt, edge);
                }
            }
            tracing::debug!(group = name, dropped, "group expanded");
        });
        true
    }

    pub fn collapse_all(&mut self, model: &mut GraphModel) -> usize {
        let names: Vec<String> = model
            .nodes()
            .filter_map(|n| n.group())
            .filter(|g| !g.collapsed)
            .map(|g| g.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        model.batch(|m| {
            let mut done = 0;
            for name in &names {
                if self.collapse_group(m, name) {
                    done += 1;
                }
            }
            done
        })
    }

    pub fn expand_all(&mut self, model: &mut GraphModel) -> usize {
        let names: Vec<String> = self.collapsed.iter().cloned().collect();
        model.batch(|m| {
            let mut done = 0;
            for name in &names {
                if self.expand_group(m, name) {
                    done += 1;
                }
            }
            done
        })
    }

    /// Re-collapses every persisted group whose placeholder came back expanded
    /// from a rebuild. Records whose placeholder is no longer collapsed are
    /// stale and dropped first.
    pub fn reapply_collapsed_state(&mut self, model: &mut GraphModel) -> usize {
        self.records.retain(|name, _| {
            model
                .node(&placeholder_id(name))
                .map(NodeData::is_collapsed_group)
                .unwrap_or(false)
        });
        self.rebuild_hidden_index();

        if !self.enabled || self.collapsed.is_empty() {
            return 0;
        }
        let names: Vec<String> = self.collapsed.iter().cloned().collect();
        let restored = model.batch(|m| {
            let mut done = 0;
            for name in &names {
                if self.collapse_group(m, name) {
                    done += 1;
                }
            }
            done
        });
        tracing::debug!(restored, persisted = names.len(), "collapsed state reapplied");
        restored
    }

    // ----- Internals -----
    fn drop_records(&mut self) {
        self.records.clear();
        self.hidden.clear();
    }

    fn rebuild_hidden_index(&mut self) {
        self.hidden = self
            .records
            .iter()
            .flat_map(|(name, record)| {
                record
                    .children
                    .iter()
                    .map(move |c| (c.id.clone(), name.clone()))
            })
            .collect();
    }

    /// Live node, or the placeholder of the collapsed group hiding it.
    fn resolve_endpoint(&self, model: &GraphModel, id: &NodeId) -> Option<NodeId> {
        if model.contains_node(id) {
            return Some(id.clone());
        }
        let placeholder = placeholder_id(self.hidden.get(id)?);
        model.contains_node(&placeholder).then_some(placeholder)
    }
}

/// Adds `member` to the aggregated edge `source -> target`, creating it on
/// first use. The aggregate keeps the occurrence count and worst state.
fn merge_into_aggregate(model: &mut GraphModel, source: NodeId, target: NodeId, member: EdgeData) {
    let id = EdgeId::aggregated(source.clone(), target.clone());
    if let Some(existing) = model.edge_mut(&id) {
        existing.state = existing.state.max(member.state);
        let agg = existing.aggregate.get_or_insert_with(|| Aggregate {
            count: 0,
            members: Vec::new(),
        });
        agg.count += 1;
        agg.members.push(member);
        existing.latency = Some(format!("×{}", agg.count));
        return;
    }

    let mut edge = EdgeData::new(source, target, member.state, false);
    edge.id = id;
    edge.aggregate = Some(Aggregate {
        count: 1,
        members: vec![member],
    });
    model.upsert_edge(edge);
}
