use dephealth_core::Snapshot;

#[derive(Debug, Clone)]
pub struct Incoming {
    pub source: String,
    pub kind: IncomingKind,
}

#[derive(Debug, Clone)]
pub enum IncomingKind {
    /// `at` is set for a point-in-time snapshot.
    Snapshot {
        snapshot: Snapshot,
        at: Option<String>,
    },
    Error(String),
}

impl Incoming {
    pub fn snapshot(source: String, snapshot: Snapshot, at: Option<String>) -> Self {
        Self {
            source,
            kind: IncomingKind::Snapshot { snapshot, at },
        }
    }

    pub fn error(source: String, msg: String) -> Self {
        Self {
            source,
            kind: IncomingKind::Error(msg),
        }
    }
}
