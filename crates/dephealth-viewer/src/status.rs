use dephealth_core::Snapshot;
use dephealth_engine::{RefreshOutcome, VisibleCounts};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub updated: String,
    pub nodes: usize,
    pub edges: usize,
    pub critical_alerts: usize,
    pub warning_alerts: usize,
    pub partial: bool,
    /// Present only while a filter is active.
    pub visible: Option<VisibleCounts>,
    pub history_at: Option<String>,
}

impl StatusLine {
    pub fn new(
        updated: String,
        snapshot: &Snapshot,
        outcome: &RefreshOutcome,
        filtered: bool,
        history_at: Option<String>,
    ) -> Self {
        let count = |severity: &str| {
            snapshot
                .alerts
                .iter()
                .filter(|a| a.severity == severity)
                .count()
        };
        Self {
            updated,
            nodes: snapshot.nodes.len(),
            edges: snapshot.edges.len(),
            critical_alerts: count("critical"),
            warning_alerts: count("warning"),
            partial: snapshot.meta.partial,
            visible: filtered.then_some(outcome.visible),
            history_at,
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.history_at {
            Some(at) => write!(f, "[history {at}]")?,
            None => write!(f, "[live, updated {}]", self.updated)?,
        }
        write!(f, " {} nodes, {} edges", self.nodes, self.edges)?;
        if self.critical_alerts + self.warning_alerts > 0 {
            write!(
                f,
                ", alerts: {} critical / {} warning",
                self.critical_alerts, self.warning_alerts
            )?;
        }
        if let Some(v) = self.visible {
            write!(f, ", showing {}/{} nodes", v.nodes, self.nodes)?;
        }
        if self.partial {
            write!(f, " (partial data)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot {
        serde_json::from_str(
            r#"{
                "nodes": [
                    {"id": "a", "label": "a", "type": "service"},
                    {"id": "b", "label": "b", "type": "redis"}
                ],
                "edges": [{"source": "a", "target": "b"}],
                "alerts": [
                    {"service": "a", "severity": "critical"},
                    {"service": "a", "severity": "warning"},
                    {"service": "a", "severity": "critical"}
                ],
                "meta": {"partial": true}
            }"#,
        )
        .expect("snapshot")
    }

    #[test]
    fn live_line_with_alerts_and_filter() {
        let outcome = RefreshOutcome {
            visible: VisibleCounts { nodes: 1, edges: 0 },
            ..RefreshOutcome::default()
        };
        let line = StatusLine::new("12:00:00".to_string(), &snapshot(), &outcome, true, None);

        assert_eq!(
            line.to_string(),
            "[live, updated 12:00:00] 2 nodes, 1 edges, alerts: 2 critical / 1 warning, showing 1/2 nodes (partial data)"
        );
    }

    #[test]
    fn history_line_omits_inactive_parts() {
        let mut snap = snapshot();
        snap.alerts.clear();
        snap.meta.partial = false;
        let line = StatusLine::new(
            "12:00:00".to_string(),
            &snap,
            &RefreshOutcome::default(),
            false,
            Some("2026-01-02T03:04:05+00:00".to_string()),
        );

        assert_eq!(
            line.to_string(),
            "[history 2026-01-02T03:04:05+00:00] 2 nodes, 1 edges"
        );
    }
}
