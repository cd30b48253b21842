use dephealth_core::{HealthState, NodeId};
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn from_label(label: &str) -> Self {
        match label {
            "critical" => Self::Critical,
            "warning" => Self::Warning,
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertSummary {
    pub count: u32,
    pub severity: Option<AlertSeverity>,
}

impl AlertSummary {
    pub fn record(&mut self, severity: AlertSeverity) {
        self.count += 1;
        self.severity = self.severity.max(Some(severity));
    }

    pub fn merge(&mut self, other: &AlertSummary) {
        self.count += other.count;
        self.severity = self.severity.max(other.severity);
    }
}

/// Derived cascade annotations, rewritten by every cascade pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeMark {
    pub count: usize,
    pub sources: BTreeSet<NodeId>,
    pub in_chain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub name: String,
    pub collapsed: bool,
    pub child_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Service,
    Dependency { dep_type: String },
    Group(GroupInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    pub state: HealthState,
    pub dimension: Option<String>,
    pub parent: Option<NodeId>,
    pub alerts: AlertSummary,
    pub cascade: CascadeMark,
    pub visible: bool,
}

impl NodeData {
    pub fn new(id: NodeId, label: impl Into<String>, kind: NodeKind, state: HealthState) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            state,
            dimension: None,
            parent: None,
            alerts: AlertSummary::default(),
            cascade: CascadeMark::default(),
            visible: true,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self.kind, NodeKind::Service)
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }

    pub fn group(&self) -> Option<&GroupInfo> {
        match &self.kind {
            NodeKind::Group(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_collapsed_group(&self) -> bool {
        self.group().map(|g| g.collapsed).unwrap_or(false)
    }

    pub fn dep_type(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Dependency { dep_type } => Some(dep_type),
            _ => None,
        }
    }
}

/// Edge identity: the endpoint pair, plus whether the edge was synthesized by
/// a group collapse. Raw and aggregated edges never share an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId {
    pub source: NodeId,
    pub target: NodeId,
    pub aggregated: bool,
}

impl EdgeId {
    pub fn raw(source: NodeId, target: NodeId) -> Self {
        Self {
            source,
            target,
            aggregated: false,
        }
    }

    pub fn aggregated(source: NodeId, target: NodeId) -> Self {
        Self {
            source,
            target,
            aggregated: true,
        }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.aggregated {
            write!(f, "agg::{}->{}", self.source, self.target)
        } else {
            write!(f, "{}->{}", self.source, self.target)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub count: usize,
    // raw edges this aggregate stands for
    pub members: Vec<EdgeData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeData {
    pub id: EdgeId,
    pub state: HealthState,
    pub critical: bool,
    pub status: Option<String>,
    pub latency: Option<String>,
    pub aggregate: Option<Aggregate>,
    pub visible: bool,
}

impl EdgeData {
    pub fn new(source: NodeId, target: NodeId, state: HealthState, critical: bool) -> Self {
        Self {
            id: EdgeId::raw(source, target),
            state,
            critical,
            status: None,
            latency: None,
            aggregate: None,
            visible: true,
        }
    }

    pub fn source(&self) -> &NodeId {
        &self.id.source
    }

    pub fn target(&self) -> &NodeId {
        &self.id.target
    }

    pub fn is_aggregated(&self) -> bool {
        self.aggregate.is_some()
    }
}

type Adjacency = HashMap<NodeId, SmallVec<[EdgeId; 4]>>;

/// Element store shared by the engines and the renderer.
///
/// Mutations made inside [`GraphModel::batch`] bump the revision once, when
/// the outermost batch ends, so a renderer polling [`GraphModel::take_repaint`]
/// only ever sees before/after states.
#[derive(Default)]
pub struct GraphModel {
    nodes: HashMap<NodeId, NodeData>,
    edges: HashMap<EdgeId, EdgeData>,
    outgoing: Adjacency,
    incoming: Adjacency,
    revision: u64,
    batch_depth: u32,
    needs_repaint: AtomicBool,
}

impl GraphModel {
    // ----- Batching -----
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.batch_depth += 1;
        let out = f(self);
        self.batch_depth -= 1;
        self.touch();
        out
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn take_repaint(&self) -> bool {
        self.needs_repaint.swap(false, Ordering::Relaxed)
    }

    fn touch(&mut self) {
        if self.batch_depth == 0 {
            self.revision += 1;
            self.needs_repaint.store(true, Ordering::Relaxed);
        }
    }

    // ----- Lookup -----
    pub fn node(&self, id: &NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Mutable access does not bump the revision on its own; wrap attribute
    /// writes in a batch.
    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&EdgeData> {
        self.edges.get(id)
    }

    pub fn edge_mut(&mut self, id: &EdgeId) -> Option<&mut EdgeData> {
        self.edges.get_mut(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut NodeData> {
        self.nodes.values_mut()
    }

    pub fn edges(&self) -> impl Iterator<Item = &EdgeData> {
        self.edges.values()
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut EdgeData> {
        self.edges.values_mut()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // ----- Mutation -----
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.touch();
    }

    pub fn upsert_node(&mut self, node: NodeData) -> Option<NodeData> {
        let old = self.nodes.insert(node.id.clone(), node);
        self.touch();
        old
    }

    /// Removes the node and every edge touching it.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<(NodeData, Vec<EdgeData>)> {
        let node = self.nodes.remove(id)?;
        let touching: Vec<EdgeId> = self.edges_for_node(id).map(|e| e.id.clone()).collect();
        let removed = touching
            .iter()
            .filter_map(|eid| self.remove_edge(eid))
            .collect();
        self.outgoing.remove(id);
        self.incoming.remove(id);
        self.touch();
        Some((node, removed))
    }

    /// Inserts or replaces an edge. Edges whose endpoints are not in the store
    /// are rejected.
    pub fn upsert_edge(&mut self, edge: EdgeData) -> bool {
        if !self.nodes.contains_key(edge.source()) || !self.nodes.contains_key(edge.target()) {
            tracing::debug!(edge = %edge.id, "skipping edge with missing endpoint");
            return false;
        }
        let id = edge.id.clone();
        if self.edges.insert(id.clone(), edge).is_none() {
            self.outgoing
                .entry(id.source.clone())
                .or_default()
                .push(id.clone());
            self.incoming.entry(id.target.clone()).or_default().push(id);
        }
        self.touch();
        true
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<EdgeData> {
        let edge = self.edges.remove(id)?;
        if let Some(list) = self.outgoing.get_mut(&id.source) {
            list.retain(|e| e != id);
        }
        if let Some(list) = self.incoming.get_mut(&id.target) {
            list.retain(|e| e != id);
        }
        self.touch();
        Some(edge)
    }

    // ----- Traversal -----
    pub fn outgoers<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a EdgeData> + 'a {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(move |eid| self.edges.get(eid))
    }

    pub fn incomers<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a EdgeData> + 'a {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(move |eid| self.edges.get(eid))
    }

    /// Outgoing then incoming edges; a self-loop is yielded once.
    pub fn edges_for_node<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a EdgeData> + 'a {
        let own = id.clone();
        self.outgoers(id)
            .chain(self.incomers(id).filter(move |e| e.id.source != own))
    }

    pub fn children(&self, parent: &NodeId) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.parent.as_ref() == Some(parent))
            .map(|n| n.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Targets of the raw edges leaving `id`. Aggregated edges contribute
    /// the targets of their members, which may be hidden nodes.
    pub fn raw_targets(&self, id: &NodeId) -> Vec<NodeId> {
        let mut targets = Vec::new();
        for edge in self.outgoers(id) {
            match &edge.aggregate {
                Some(agg) => targets.extend(agg.members.iter().map(|m| m.target().clone())),
                None => targets.push(edge.target().clone()),
            }
        }
        targets
    }
}
