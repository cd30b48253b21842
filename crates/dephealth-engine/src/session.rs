//! Refresh pipeline tying the engines to one store.
//!
//! Per snapshot: known filter values, rebuild or patch, cascade, reapply
//! collapsed groups after a rebuild, filters. The whole cycle runs as one
//! batch, so a renderer sees a single revision per refresh.

use dephealth_core::Snapshot;

use crate::cascade::compute_cascade_warnings;
use crate::filter::{FilterDimension, FilterEngine, VisibleCounts};
use crate::graph::ingest::{self, structure_signature, StructureSignature};
use crate::graph::model::GraphModel;
use crate::grouping::{GroupingDimension, GroupingEngine};
use crate::view_state::ViewState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Node or edge set differs from the previous snapshot; hosts relayout.
    pub structure_changed: bool,
    pub rebuilt: bool,
    pub restored_groups: usize,
    pub visible: VisibleCounts,
}

#[derive(Debug, Default)]
pub struct Session {
    grouping: GroupingEngine,
    filters: FilterEngine,
    signature: Option<StructureSignature>,
    snapshot: Option<Snapshot>,
}

impl Session {
    pub fn new(view: ViewState) -> Self {
        Self {
            grouping: GroupingEngine::new(view.grouping),
            filters: FilterEngine::new(view.filters),
            signature: None,
            snapshot: None,
        }
    }

    pub fn view_state(&self) -> ViewState {
        ViewState {
            grouping: self.grouping.prefs(),
            filters: self.filters.selections().clone(),
        }
    }

    pub fn grouping(&self) -> &GroupingEngine {
        &self.grouping
    }

    pub fn filters(&self) -> &FilterEngine {
        &self.filters
    }

    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    // ----- Refresh -----
    pub fn apply_snapshot(&mut self, model: &mut GraphModel, snapshot: Snapshot) -> RefreshOutcome {
        self.filters.update_known_values(&snapshot);
        let signature = structure_signature(&snapshot);
        let structure_changed = self.signature.as_ref() != Some(&signature);
        // Hidden children are not in the store, so a patch could not reach them.
        let rebuild = structure_changed || self.grouping.has_records();

        let outcome = model.batch(|m| {
            let restored_groups = if rebuild {
                self.materialize(m, &snapshot)
            } else {
                ingest::patch(m, &snapshot);
                compute_cascade_warnings(m);
                0
            };
            RefreshOutcome {
                structure_changed,
                rebuilt: rebuild,
                restored_groups,
                visible: self.filters.apply_filters(m, &self.grouping),
            }
        });

        tracing::debug!(
            structure_changed,
            rebuilt = outcome.rebuilt,
            restored = outcome.restored_groups,
            visible_nodes = outcome.visible.nodes,
            visible_edges = outcome.visible.edges,
            "snapshot applied"
        );
        self.signature = Some(signature);
        self.snapshot = Some(snapshot);
        outcome
    }

    /// Rebuild, cascade over the full graph, then collapse again.
    fn materialize(&mut self, model: &mut GraphModel, snapshot: &Snapshot) -> usize {
        let compound = self
            .grouping
            .is_enabled()
            .then(|| self.grouping.build_compound_elements(snapshot));
        ingest::rebuild(model, snapshot, self.grouping.dimension(), compound.as_ref());
        compute_cascade_warnings(model);
        self.grouping.reapply_collapsed_state(model)
    }

    fn rematerialize(&mut self, model: &mut GraphModel) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        model.batch(|m| {
            self.materialize(m, &snapshot);
            self.filters.apply_filters(m, &self.grouping);
        });
        self.snapshot = Some(snapshot);
    }

    // ----- Grouping -----
    pub fn set_grouping_enabled(&mut self, model: &mut GraphModel, enabled: bool) -> bool {
        if self.grouping.is_enabled() == enabled {
            return false;
        }
        self.grouping.set_grouping_enabled(enabled);
        self.rematerialize(model);
        true
    }

    pub fn set_grouping_dimension(
        &mut self,
        model: &mut GraphModel,
        dimension: GroupingDimension,
    ) -> bool {
        if !self.grouping.set_grouping_dimension(dimension) {
            return false;
        }
        if self.grouping.is_enabled() {
            self.rematerialize(model);
        }
        true
    }

    pub fn collapse_group(&mut self, model: &mut GraphModel, name: &str) -> bool {
        model.batch(|m| {
            let changed = self.grouping.collapse_group(m, name);
            if changed {
                self.filters.apply_filters(m, &self.grouping);
            }
            changed
        })
    }

    pub fn expand_group(&mut self, model: &mut GraphModel, name: &str) -> bool {
        model.batch(|m| {
            let changed = self.grouping.expand_group(m, name);
            if changed {
                self.filters.apply_filters(m, &self.grouping);
            }
            changed
        })
    }

    pub fn collapse_all(&mut self, model: &mut GraphModel) -> usize {
        model.batch(|m| {
            let n = self.grouping.collapse_all(m);
            self.filters.apply_filters(m, &self.grouping);
            n
        })
    }

    pub fn expand_all(&mut self, model: &mut GraphModel) -> usize {
        model.batch(|m| {
            let n = self.grouping.expand_all(m);
            self.filters.apply_filters(m, &self.grouping);
            n
        })
    }

    // ----- Filters -----
    pub fn toggle_filter(
        &mut self,
        model: &mut GraphModel,
        dimension: FilterDimension,
        value: &str,
    ) -> Option<bool> {
        let now_on = self.filters.toggle(dimension, value)?;
        self.filters.apply_filters(model, &self.grouping);
        Some(now_on)
    }

    pub fn reset_filters(&mut self, model: &mut GraphModel) -> VisibleCounts {
        self.filters.reset();
        self.filters.apply_filters(model, &self.grouping)
    }
}
