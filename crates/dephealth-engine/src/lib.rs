//! Live graph-state engine: cascade attribution, compound grouping with
//! collapse/expand, and visibility filtering over one shared store.

pub mod cascade;
pub mod filter;
pub mod graph;
pub mod grouping;
pub mod namespace;
pub mod session;
pub mod view_state;

pub use cascade::compute_cascade_warnings;
pub use filter::{FilterDimension, FilterEngine, FilterSelections, StateFilter, VisibleCounts};
pub use graph::GraphModel;
pub use grouping::{GroupingDimension, GroupingEngine, GroupingPrefs};
pub use session::{RefreshOutcome, Session};
pub use view_state::ViewState;
