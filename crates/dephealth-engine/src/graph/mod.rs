pub mod ingest;
pub mod model;

pub use model::{
    AlertSeverity, AlertSummary, CascadeMark, EdgeData, EdgeId, GraphModel, GroupInfo, NodeData,
    NodeKind,
};
