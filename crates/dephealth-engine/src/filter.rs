//! Visibility filtering over four independent inclusion sets.
//!
//! An empty set places no restriction on its dimension. Each pass of
//! [`FilterEngine::apply_filters`] refines the previous one. Collapsed group
//! summaries join the visible set before the chain-reveal pass, and chain
//! reveal runs before orphan pruning so the neighbors it reveals keep their
//! connecting edge.

use dephealth_core::{HealthState, NodeId, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::graph::model::{EdgeData, EdgeId, GraphModel, NodeData, NodeKind};
use crate::grouping::GroupingEngine;

/// A selectable state: the four real health states plus two virtual ones
/// derived from engine annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    Ok,
    Degraded,
    Down,
    Unknown,
    /// Implicated in a current outage: warned by the cascade pass without
    /// being down itself, or on a failure's chain to its root cause.
    Warning,
    /// Carries at least one active alert.
    Alerting,
}

impl StateFilter {
    pub const ALL: [StateFilter; 6] = [
        Self::Ok,
        Self::Degraded,
        Self::Down,
        Self::Unknown,
        Self::Warning,
        Self::Alerting,
    ];

    pub fn parse(input: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == input)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Down => "down",
            Self::Unknown => "unknown",
            Self::Warning => "warning",
            Self::Alerting => "alerting",
        }
    }
}

impl From<HealthState> for StateFilter {
    fn from(state: HealthState) -> Self {
        match state {
            HealthState::Ok => Self::Ok,
            HealthState::Degraded => Self::Degraded,
            HealthState::Down => Self::Down,
            HealthState::Unknown => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDimension {
    Type,
    State,
    Status,
    Service,
}

impl FilterDimension {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "type" => Some(Self::Type),
            "state" => Some(Self::State),
            "status" => Some(Self::Status),
            "service" => Some(Self::Service),
            _ => None,
        }
    }
}

/// Persisted filter selections, one set per dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelections {
    pub types: BTreeSet<String>,
    pub states: BTreeSet<StateFilter>,
    pub statuses: BTreeSet<String>,
    pub services: BTreeSet<NodeId>,
}

impl FilterSelections {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
            && self.states.is_empty()
            && self.statuses.is_empty()
            && self.services.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownValues {
    pub types: BTreeSet<String>,
    pub statuses: BTreeSet<String>,
    pub services: BTreeSet<NodeId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibleCounts {
    pub nodes: usize,
    pub edges: usize,
}

pub fn visible_counts(model: &GraphModel) -> VisibleCounts {
    VisibleCounts {
        nodes: model.nodes().filter(|n| n.visible).count(),
        edges: model.edges().filter(|e| e.visible).count(),
    }
}

fn is_warning(node: &NodeData) -> bool {
    (node.cascade.count > 0 && node.state != HealthState::Down) || node.cascade.in_chain
}

struct Matcher<'a> {
    sel: &'a FilterSelections,
    // downstream closure of the selected services, when any are selected
    closure: Option<HashSet<NodeId>>,
}

impl Matcher<'_> {
    fn matches_state(&self, node: &NodeData) -> bool {
        let states = &self.sel.states;
        states.contains(&StateFilter::from(node.state))
            || (states.contains(&StateFilter::Warning) && is_warning(node))
            || (states.contains(&StateFilter::Alerting) && node.alerts.count > 0)
    }

    fn state_passes(&self, node: &NodeData) -> bool {
        self.sel.states.is_empty() || self.matches_state(node)
    }

    fn in_closure(&self, id: &NodeId) -> Option<bool> {
        self.closure.as_ref().map(|c| c.contains(id))
    }

    fn node_passes(&self, node: &NodeData) -> bool {
        match &node.kind {
            NodeKind::Service => self.in_closure(&node.id).unwrap_or(true) && self.state_passes(node),
            NodeKind::Dependency { dep_type } => {
                let type_ok = self.in_closure(&node.id) == Some(true)
                    || self.sel.types.is_empty()
                    || self.sel.types.contains(dep_type);
                type_ok && self.state_passes(node)
            }
            NodeKind::Group(_) => false,
        }
    }

    fn status_passes(&self, edge: &EdgeData) -> bool {
        if self.sel.statuses.is_empty() {
            return true;
        }
        match &edge.aggregate {
            Some(agg) => agg.members.iter().any(|m| self.status_passes(m)),
            None => edge
                .status
                .as_ref()
                .map(|s| self.sel.statuses.contains(s))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Default)]
pub struct FilterEngine {
    active: FilterSelections,
    known: KnownValues,
}

impl FilterEngine {
    pub fn new(selections: FilterSelections) -> Self {
        Self {
            active: selections,
            known: KnownValues::default(),
        }
    }

    pub fn selections(&self) -> &FilterSelections {
        &self.active
    }

    pub fn known_values(&self) -> &KnownValues {
        &self.known
    }

    pub fn has_active_filters(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn reset(&mut self) {
        self.active = FilterSelections::default();
    }

    /// Flips `value` in one dimension. Returns whether the value is now
    /// selected, or `None` for a value the state dimension does not know.
    pub fn toggle(&mut self, dimension: FilterDimension, value: &str) -> Option<bool> {
        fn flip<T: Ord>(set: &mut BTreeSet<T>, value: T) -> bool {
            if set.remove(&value) {
                false
            } else {
                set.insert(value);
                true
            }
        }
        let now_on = match dimension {
            FilterDimension::Type => flip(&mut self.active.types, value.to_string()),
            FilterDimension::Status => flip(&mut self.active.statuses, value.to_string()),
            FilterDimension::Service => flip(&mut self.active.services, NodeId::new(value)),
            FilterDimension::State => flip(&mut self.active.states, StateFilter::parse(value)?),
        };
        Some(now_on)
    }

    /// Refreshes the selectable values from a snapshot and drops type and
    /// service selections that no longer exist.
    pub fn update_known_values(&mut self, snapshot: &Snapshot) {
        let mut known = KnownValues::default();
        for node in &snapshot.nodes {
            if node.is_service() {
                known.services.insert(node.id.clone());
            } else {
                known.types.insert(node.node_type.clone());
            }
        }
        known.statuses = snapshot
            .edges
            .iter()
            .filter_map(|e| e.status.clone())
            .collect();

        let before = (self.active.types.len(), self.active.services.len());
        self.active.types.retain(|t| known.types.contains(t));
        self.active.services.retain(|s| known.services.contains(s));
        if before != (self.active.types.len(), self.active.services.len()) {
            tracing::debug!("pruned filter selections missing from snapshot");
        }
        self.known = known;
    }

    /// Recomputes the `visible` flag of every node and edge in one batch.
    pub fn apply_filters(&self, model: &mut GraphModel, grouping: &GroupingEngine) -> VisibleCounts {
        if !self.has_active_filters() {
            model.batch(|m| {
                for node in m.nodes_mut() {
                    node.visible = true;
                }
                for edge in m.edges_mut() {
                    edge.visible = true;
                }
            });
            return visible_counts(model);
        }

        let matcher = Matcher {
            sel: &self.active,
            closure: self.service_closure(model, grouping),
        };

        let mut visible: HashSet<NodeId> = model
            .nodes()
            .filter(|n| matcher.node_passes(n))
            .map(|n| n.id.clone())
            .collect();

        // Collapsed groups are judged by their cached children.
        for node in model.nodes() {
            let Some(info) = node.group().filter(|g| g.collapsed) else {
                continue;
            };
            let any_child = grouping
                .collapsed_children(&info.name)
                .map(|children| children.iter().any(|c| matcher.node_passes(c)))
                .unwrap_or(false);
            if any_child {
                visible.insert(node.id.clone());
            }
        }

        if self.active.states.contains(&StateFilter::Degraded)
            || self.active.states.contains(&StateFilter::Down)
        {
            let revealed = reveal_failure_neighbors(model, &visible);
            visible.extend(revealed);
        }

        let visible_edges: HashSet<EdgeId> = model
            .edges()
            .filter(|e| visible.contains(e.source()) && visible.contains(e.target()))
            .filter(|e| matcher.status_passes(e))
            .map(|e| e.id.clone())
            .collect();

        let orphans: Vec<NodeId> = model
            .nodes()
            .filter(|n| !n.is_group() && visible.contains(&n.id))
            .filter(|n| {
                let mut edges = model.edges_for_node(&n.id).peekable();
                edges.peek().is_some() && edges.all(|e| !visible_edges.contains(&e.id))
            })
            .filter(|n| matcher.sel.states.is_empty() || !matcher.matches_state(n))
            .map(|n| n.id.clone())
            .collect();
        for id in &orphans {
            visible.remove(id);
        }

        let expanded_groups: Vec<NodeId> = model
            .nodes()
            .filter(|n| n.group().map(|g| !g.collapsed).unwrap_or(false))
            .filter(|n| model.children(&n.id).iter().any(|c| visible.contains(c)))
            .map(|n| n.id.clone())
            .collect();
        visible.extend(expanded_groups);

        tracing::trace!(
            nodes = visible.len(),
            edges = visible_edges.len(),
            orphans = orphans.len(),
            "filters applied"
        );

        model.batch(|m| {
            for node in m.nodes_mut() {
                node.visible = visible.contains(&node.id);
            }
            for edge in m.edges_mut() {
                edge.visible = visible_edges.contains(&edge.id);
            }
        });
        VisibleCounts {
            nodes: visible.len(),
            edges: visible_edges.len(),
        }
    }

    /// Everything downstream of the selected services over raw edges. A
    /// service hidden in a collapsed group walks its recorded edges, so the
    /// closure does not depend on what is collapsed.
    fn service_closure(&self, model: &GraphModel, grouping: &GroupingEngine) -> Option<HashSet<NodeId>> {
        if self.active.services.is_empty() {
            return None;
        }
        let mut closure: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = self.active.services.iter().cloned().collect();
        while let Some(cur) = queue.pop_front() {
            if !closure.insert(cur.clone()) {
                continue;
            }
            if model.contains_node(&cur) {
                queue.extend(model.raw_targets(&cur));
            } else {
                queue.extend(grouping.stored_edges_from(&cur).map(|e| e.target().clone()));
            }
        }
        Some(closure)
    }
}

/// Non-ok targets one outgoing edge away from a visible degraded or down node.
fn reveal_failure_neighbors(model: &GraphModel, visible: &HashSet<NodeId>) -> Vec<NodeId> {
    visible
        .iter()
        .filter_map(|id| model.node(id))
        .filter(|n| matches!(n.state, HealthState::Degraded | HealthState::Down))
        .flat_map(|n| model.outgoers(&n.id))
        .map(EdgeData::target)
        .filter(|t| {
            model
                .node(t)
                .map(|n| !n.is_group() && n.state != HealthState::Ok)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::compute_cascade_warnings;
    use crate::graph::model::fixtures::*;
    use crate::graph::model::{AlertSeverity, GroupInfo};
    use crate::grouping::{placeholder_id, GroupingPrefs};

    fn engine(f: impl FnOnce(&mut FilterSelections)) -> FilterEngine {
        let mut sel = FilterSelections::default();
        f(&mut sel);
        FilterEngine::new(sel)
    }

    fn visible(model: &GraphModel, name: &str) -> bool {
        model.node(&id(name)).map(|n| n.visible).unwrap_or(false)
    }

    fn status_edge(from: &str, to: &str, status: &str) -> EdgeData {
        let mut e = edge(from, to, true);
        e.status = Some(status.to_string());
        e
    }

    // gw -> api(degraded) -> pg(down, postgres)
    //    -> cache(ok, redis)
    // solo(ok) has no edges
    fn topology() -> GraphModel {
        let mut model = GraphModel::default();
        model.upsert_node(service("gw", HealthState::Ok));
        model.upsert_node(service("api", HealthState::Degraded));
        model.upsert_node(service("solo", HealthState::Ok));
        model.upsert_node(dependency("pg", "postgres", HealthState::Down));
        model.upsert_node(dependency("cache", "redis", HealthState::Ok));
        model.upsert_edge(status_edge("gw", "api", "ok"));
        model.upsert_edge(status_edge("api", "pg", "timeout"));
        model.upsert_edge(status_edge("gw", "cache", "ok"));
        model
    }

    #[test]
    fn no_filters_show_everything() {
        let mut model = topology();
        model.node_mut(&id("gw")).expect("gw").visible = false;
        let counts = FilterEngine::default().apply_filters(&mut model, &GroupingEngine::default());
        assert_eq!(counts, VisibleCounts { nodes: 5, edges: 3 });
    }

    #[test]
    fn type_filter_keeps_services_and_matching_dependencies() {
        let mut model = topology();
        let filters = engine(|s| {
            s.types.insert("postgres".to_string());
        });
        filters.apply_filters(&mut model, &GroupingEngine::default());

        assert!(visible(&model, "pg"));
        assert!(!visible(&model, "cache"));
        assert!(visible(&model, "api"));
        // gw keeps its visible edge to api
        assert!(visible(&model, "gw"));
        // edgeless nodes are never orphans
        assert!(visible(&model, "solo"));
    }

    #[test]
    fn chain_reveal_shows_failing_neighbor() {
        // state {down}; x(down) -> y(degraded)
        let mut model = GraphModel::default();
        model.upsert_node(service("x", HealthState::Down));
        model.upsert_node(service("y", HealthState::Degraded));
        model.upsert_node(service("z", HealthState::Ok));
        model.upsert_edge(edge("x", "y", true));
        model.upsert_edge(edge("x", "z", true));
        let filters = engine(|s| {
            s.states.insert(StateFilter::Down);
        });

        filters.apply_filters(&mut model, &GroupingEngine::default());

        assert!(visible(&model, "x"));
        assert!(visible(&model, "y"));
        assert!(!visible(&model, "z"));
        assert!(model.edge(&EdgeId::raw(id("x"), id("y"))).expect("edge").visible);
    }

    #[test]
    fn warning_state_matches_cascade_annotations() {
        // b -> a(down), c -> b: b and c warn, a is on the chain.
        let mut model = GraphModel::default();
        model.upsert_node(service("a", HealthState::Down));
        model.upsert_node(service("b", HealthState::Ok));
        model.upsert_node(service("c", HealthState::Ok));
        model.upsert_node(service("d", HealthState::Ok));
        model.upsert_edge(edge("b", "a", true));
        model.upsert_edge(edge("c", "b", true));
        model.upsert_edge(edge("d", "c", false));
        compute_cascade_warnings(&mut model);
        let filters = engine(|s| {
            s.states.insert(StateFilter::Warning);
        });

        filters.apply_filters(&mut model, &GroupingEngine::default());

        for name in ["a", "b", "c"] {
            assert!(visible(&model, name), "{name} should be visible");
        }
        assert!(!visible(&model, "d"));
    }

    #[test]
    fn alerting_state_matches_alerted_nodes() {
        let mut model = topology();
        model
            .node_mut(&id("cache"))
            .expect("cache")
            .alerts
            .record(AlertSeverity::Warning);
        let filters = engine(|s| {
            s.states.insert(StateFilter::Alerting);
        });

        filters.apply_filters(&mut model, &GroupingEngine::default());

        assert!(visible(&model, "cache"));
        assert!(!visible(&model, "gw"));
    }

    #[test]
    fn service_filter_reveals_downstream_closure() {
        let mut model = topology();
        let filters = engine(|s| {
            s.services.insert(id("api"));
            s.types.insert("redis".to_string());
        });

        filters.apply_filters(&mut model, &GroupingEngine::default());

        assert!(visible(&model, "api"));
        // postgres is excluded by type but sits downstream of api
        assert!(visible(&model, "pg"));
        assert!(!visible(&model, "gw"));
        // cache passes the type filter but lost its only edge
        assert!(!visible(&model, "cache"));
    }

    #[test]
    fn service_closure_still_honors_state() {
        let mut model = topology();
        let filters = engine(|s| {
            s.services.insert(id("gw"));
            s.states.insert(StateFilter::Ok);
        });

        filters.apply_filters(&mut model, &GroupingEngine::default());

        assert!(visible(&model, "cache"));
        assert!(!visible(&model, "api"));
        assert!(!visible(&model, "pg"));
    }

    #[test]
    fn status_filter_hides_edges_then_orphans() {
        let mut model = topology();
        let filters = engine(|s| {
            s.statuses.insert("timeout".to_string());
        });

        filters.apply_filters(&mut model, &GroupingEngine::default());

        assert!(model.edge(&EdgeId::raw(id("api"), id("pg"))).expect("edge").visible);
        assert!(!model.edge(&EdgeId::raw(id("gw"), id("api"))).expect("edge").visible);
        assert!(!visible(&model, "gw"));
        assert!(!visible(&model, "cache"));
        assert!(visible(&model, "api"));
        assert!(visible(&model, "pg"));
    }

    #[test]
    fn state_match_overrides_orphan_pruning() {
        let mut model = topology();
        let filters = engine(|s| {
            s.statuses.insert("timeout".to_string());
            s.states.insert(StateFilter::Ok);
            s.states.insert(StateFilter::Degraded);
            s.states.insert(StateFilter::Down);
        });

        filters.apply_filters(&mut model, &GroupingEngine::default());

        // gw lost every edge to the status filter but matches `ok` itself
        assert!(visible(&model, "gw"));
        assert!(visible(&model, "cache"));
    }

    #[test]
    fn edge_visibility_implies_endpoint_visibility() {
        let mut model = topology();
        for sel in [
            engine(|s| {
                s.states.insert(StateFilter::Down);
            }),
            engine(|s| {
                s.statuses.insert("ok".to_string());
            }),
            engine(|s| {
                s.services.insert(id("gw"));
                s.types.insert("redis".to_string());
            }),
        ] {
            sel.apply_filters(&mut model, &GroupingEngine::default());
            for e in model.edges().filter(|e| e.visible) {
                assert!(visible(&model, e.source().as_str()));
                assert!(visible(&model, e.target().as_str()));
            }
        }
    }

    fn visible_nodes_with(f: impl FnOnce(&mut FilterSelections)) -> usize {
        let mut model = topology();
        compute_cascade_warnings(&mut model);
        engine(f)
            .apply_filters(&mut model, &GroupingEngine::default())
            .nodes
    }

    #[test]
    fn adding_values_never_shrinks_visible_nodes() {
        let narrow = visible_nodes_with(|s| {
            s.states.insert(StateFilter::Degraded);
        });
        for state in StateFilter::ALL {
            let wide = visible_nodes_with(|s| {
                s.states.insert(StateFilter::Degraded);
                s.states.insert(state);
            });
            assert!(wide >= narrow, "adding state {state:?}");
        }

        let narrow = visible_nodes_with(|s| {
            s.types.insert("postgres".to_string());
        });
        for ty in ["redis", "postgres", "kafka"] {
            let wide = visible_nodes_with(|s| {
                s.types.insert("postgres".to_string());
                s.types.insert(ty.to_string());
            });
            assert!(wide >= narrow, "adding type {ty}");
        }

        let narrow = visible_nodes_with(|s| {
            s.statuses.insert("timeout".to_string());
        });
        for status in ["ok", "timeout"] {
            let wide = visible_nodes_with(|s| {
                s.statuses.insert("timeout".to_string());
                s.statuses.insert(status.to_string());
            });
            assert!(wide >= narrow, "adding status {status}");
        }

        let narrow = visible_nodes_with(|s| {
            s.services.insert(id("api"));
        });
        for svc in ["gw", "solo"] {
            let wide = visible_nodes_with(|s| {
                s.services.insert(id("api"));
                s.services.insert(id(svc));
            });
            assert!(wide >= narrow, "adding service {svc}");
        }
    }

    #[test]
    fn collapsed_group_visible_when_a_cached_child_passes() {
        let mut model = GraphModel::default();
        model.upsert_node(NodeData::new(
            placeholder_id("data"),
            "data",
            NodeKind::Group(GroupInfo {
                name: "data".to_string(),
                collapsed: false,
                child_count: 0,
            }),
            HealthState::Ok,
        ));
        let mut pg = dependency("pg", "postgres", HealthState::Down);
        pg.parent = Some(placeholder_id("data"));
        model.upsert_node(pg);
        model.upsert_node(service("api", HealthState::Ok));
        model.upsert_edge(edge("api", "pg", true));

        let mut grouping = GroupingEngine::new(GroupingPrefs {
            enabled: true,
            ..GroupingPrefs::default()
        });
        grouping.collapse_group(&mut model, "data");

        let postgres = engine(|s| {
            s.types.insert("postgres".to_string());
        });
        postgres.apply_filters(&mut model, &grouping);
        let group = model.node(&placeholder_id("data")).expect("group");
        assert!(group.visible);
        assert!(visible(&model, "api"));

        let redis = engine(|s| {
            s.types.insert("redis".to_string());
        });
        redis.apply_filters(&mut model, &grouping);
        assert!(!model.node(&placeholder_id("data")).expect("group").visible);
        // api lost its only (aggregated) edge
        assert!(!visible(&model, "api"));
    }

    // shop{web} -> billing -> pg; admin -> billing
    fn shop_front(web_state: HealthState, billing_state: HealthState) -> (GraphModel, GroupingEngine) {
        let mut model = GraphModel::default();
        model.upsert_node(NodeData::new(
            placeholder_id("shop"),
            "shop",
            NodeKind::Group(GroupInfo {
                name: "shop".to_string(),
                collapsed: false,
                child_count: 0,
            }),
            HealthState::Ok,
        ));
        let mut web = service("web", web_state);
        web.parent = Some(placeholder_id("shop"));
        model.upsert_node(web);
        model.upsert_node(service("billing", billing_state));
        model.upsert_node(service("admin", HealthState::Ok));
        model.upsert_node(dependency("pg", "postgres", HealthState::Ok));
        model.upsert_edge(edge("web", "billing", true));
        model.upsert_edge(edge("billing", "pg", true));
        model.upsert_edge(edge("admin", "billing", false));
        let grouping = GroupingEngine::new(GroupingPrefs {
            enabled: true,
            ..GroupingPrefs::default()
        });
        (model, grouping)
    }

    #[test]
    fn service_closure_survives_collapsing_its_group() {
        let (mut model, mut grouping) = shop_front(HealthState::Ok, HealthState::Ok);
        let filters = engine(|s| {
            s.services.insert(id("web"));
        });

        filters.apply_filters(&mut model, &grouping);
        assert!(visible(&model, "web"));
        assert!(visible(&model, "billing"));
        assert!(visible(&model, "pg"));
        assert!(!visible(&model, "admin"));

        assert!(grouping.collapse_group(&mut model, "shop"));
        filters.apply_filters(&mut model, &grouping);
        assert!(model.node(&placeholder_id("shop")).expect("group").visible);
        assert!(visible(&model, "billing"));
        assert!(visible(&model, "pg"));
        assert!(!visible(&model, "admin"));
        let agg = EdgeId::aggregated(placeholder_id("shop"), id("billing"));
        assert!(model.edge(&agg).expect("aggregated edge").visible);
    }

    #[test]
    fn collapsed_summary_reveals_failing_neighbor() {
        let (mut model, mut grouping) = shop_front(HealthState::Down, HealthState::Degraded);
        let filters = engine(|s| {
            s.states.insert(StateFilter::Down);
        });

        filters.apply_filters(&mut model, &grouping);
        assert!(visible(&model, "web"));
        assert!(visible(&model, "billing"));

        assert!(grouping.collapse_group(&mut model, "shop"));
        filters.apply_filters(&mut model, &grouping);
        let group = model.node(&placeholder_id("shop")).expect("group");
        assert_eq!(group.state, HealthState::Down);
        assert!(group.visible);
        assert!(visible(&model, "billing"));
        assert!(!visible(&model, "pg"));
        assert!(!visible(&model, "admin"));
    }

    #[test]
    fn expanded_group_follows_children() {
        let mut model = topology();
        model.upsert_node(NodeData::new(
            placeholder_id("db"),
            "db",
            NodeKind::Group(GroupInfo {
                name: "db".to_string(),
                collapsed: false,
                child_count: 0,
            }),
            HealthState::Ok,
        ));
        model.node_mut(&id("pg")).expect("pg").parent = Some(placeholder_id("db"));

        engine(|s| {
            s.types.insert("postgres".to_string());
        })
        .apply_filters(&mut model, &GroupingEngine::default());
        assert!(model.node(&placeholder_id("db")).expect("group").visible);

        engine(|s| {
            s.types.insert("redis".to_string());
        })
        .apply_filters(&mut model, &GroupingEngine::default());
        assert!(!model.node(&placeholder_id("db")).expect("group").visible);
    }

    #[test]
    fn toggle_and_prune_selections() {
        let mut filters = FilterEngine::default();
        assert_eq!(filters.toggle(FilterDimension::State, "warning"), Some(true));
        assert_eq!(filters.toggle(FilterDimension::State, "warning"), Some(false));
        assert_eq!(filters.toggle(FilterDimension::State, "bogus"), None);
        filters.toggle(FilterDimension::Type, "redis");
        filters.toggle(FilterDimension::Type, "mongo");
        filters.toggle(FilterDimension::Service, "gone");
        filters.toggle(FilterDimension::Status, "timeout");

        let snapshot: Snapshot = serde_json::from_str(
            r#"{
                "nodes": [
                    {"id": "api", "label": "api", "type": "service"},
                    {"id": "r", "label": "r", "type": "redis"}
                ],
                "edges": [{"source": "api", "target": "r", "status": "ok"}]
            }"#,
        )
        .expect("snapshot");
        filters.update_known_values(&snapshot);

        let sel = filters.selections();
        assert_eq!(sel.types, BTreeSet::from(["redis".to_string()]));
        assert!(sel.services.is_empty());
        assert_eq!(sel.statuses, BTreeSet::from(["timeout".to_string()]));
        assert_eq!(filters.known_values().services, BTreeSet::from([id("api")]));
        assert_eq!(filters.known_values().statuses, BTreeSet::from(["ok".to_string()]));

        filters.reset();
        assert!(!filters.has_active_filters());
    }
}
