mod commands;
mod net;
mod status;
mod util;

use anyhow::Result;
use commands::Command;
use crossbeam_channel::Receiver;
use dephealth_engine::{GraphModel, Session, ViewState};
use net::{Control, Incoming, IncomingKind, PollerHandle};
use status::StatusLine;
use util::config::{self, ViewerConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

enum Event {
    Incoming(Incoming),
    Line(String),
    PollerGone,
    StdinClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct Viewer {
    cfg: ViewerConfig,
    session: Session,
    model: GraphModel,
    poller: PollerHandle,
    // set while viewing a point in time
    history_at: Option<String>,
    last_status: Option<StatusLine>,
}

impl Viewer {
    fn new(cfg: ViewerConfig, view: ViewState, poller: PollerHandle) -> Self {
        Self {
            cfg,
            session: Session::new(view),
            model: GraphModel::default(),
            poller,
            history_at: None,
            last_status: None,
        }
    }

    fn on_incoming(&mut self, incoming: Incoming) {
        match incoming.kind {
            IncomingKind::Snapshot { snapshot, at } => {
                if at != self.history_at {
                    tracing::debug!(at = ?at, "dropping snapshot from previous mode");
                    return;
                }
                let outcome = self.session.apply_snapshot(&mut self.model, snapshot);
                if outcome.structure_changed {
                    tracing::info!(
                        nodes = self.model.node_count(),
                        edges = self.model.edge_count(),
                        restored_groups = outcome.restored_groups,
                        "topology changed, relayout"
                    );
                }
                if let Some(snapshot) = self.session.last_snapshot() {
                    let line = StatusLine::new(
                        chrono::Local::now().format("%H:%M:%S").to_string(),
                        snapshot,
                        &outcome,
                        self.session.filters().has_active_filters(),
                        at,
                    );
                    tracing::info!("{line}");
                    self.last_status = Some(line);
                }
                self.repaint();
            }
            IncomingKind::Error(msg) => {
                tracing::warn!(source = %incoming.source, error = %msg, "no new snapshot, keeping last good view");
            }
        }
    }

    fn on_command(&mut self, line: &str) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue;
        }
        let cmd = match commands::parse(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!("{e}");
                tracing::info!("{}", commands::HELP);
                return Flow::Continue;
            }
        };

        let model = &mut self.model;
        let view_changed = match cmd {
            Command::Collapse(name) => {
                let done = self.session.collapse_group(model, &name);
                tracing::info!(group = %name, done, "collapse");
                done
            }
            Command::Expand(name) => {
                let done = self.session.expand_group(model, &name);
                tracing::info!(group = %name, done, "expand");
                done
            }
            Command::CollapseAll => {
                let groups = self.session.collapse_all(model);
                tracing::info!(groups, "collapsed all groups");
                groups > 0
            }
            Command::ExpandAll => {
                let groups = self.session.expand_all(model);
                tracing::info!(groups, "expanded all groups");
                groups > 0
            }
            Command::Grouping(enabled) => self.session.set_grouping_enabled(model, enabled),
            Command::Dimension(dimension) => self.session.set_grouping_dimension(model, dimension),
            Command::Filter(dimension, value) => {
                match self.session.toggle_filter(model, dimension, &value) {
                    Some(selected) => {
                        tracing::info!(value = %value, selected, "filter toggled");
                        true
                    }
                    None => {
                        tracing::warn!(value = %value, "unknown state filter");
                        false
                    }
                }
            }
            Command::FilterReset => {
                let visible = self.session.reset_filters(model);
                tracing::info!(nodes = visible.nodes, edges = visible.edges, "filters reset");
                true
            }
            Command::History(at) => {
                self.history_at = Some(at.clone());
                self.send_control(Control::History(at));
                false
            }
            Command::Live => {
                self.history_at = None;
                self.send_control(Control::Live);
                false
            }
            Command::Refresh => {
                self.send_control(Control::RefreshNow);
                false
            }
            Command::Status => {
                self.log_status();
                false
            }
            Command::Quit => return Flow::Quit,
        };

        if view_changed {
            self.persist_view();
            self.repaint();
        }
        Flow::Continue
    }

    fn send_control(&self, cmd: Control) {
        if !self.poller.send(cmd) {
            tracing::warn!("poller is not running");
        }
    }

    fn log_status(&self) {
        match &self.last_status {
            Some(line) => tracing::info!("{line}"),
            None => tracing::info!("no snapshot received yet"),
        }
        let view = self.session.view_state();
        tracing::info!(
            grouping = view.grouping.enabled,
            dimension = ?view.grouping.dimension,
            collapsed = ?view.grouping.collapsed,
            expanded_groups = self.session.grouping().has_expanded_groups(&self.model),
            filters = ?view.filters,
            "view"
        );
    }

    fn persist_view(&self) {
        if !self.cfg.persist_view {
            return;
        }
        if let Err(e) = config::save_view_state(&self.session.view_state()) {
            tracing::warn!(error = %format!("{e:#}"), "failed to save view state");
        }
    }

    /// Stand-in for the renderer: observe the store once per revision.
    fn repaint(&self) {
        if self.model.take_repaint() {
            tracing::trace!(revision = self.model.revision(), "repaint");
        }
    }

    fn shutdown(self) {
        self.persist_view();
        self.poller.shutdown();
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cfg = config::load_or_default();
    let view = if cfg.persist_view {
        config::load_view_state()
    } else {
        ViewState::default()
    };
    tracing::info!(
        socket = %cfg.socket_path,
        interval_secs = cfg.poll_interval_secs,
        grouping = view.grouping.enabled,
        "dephealth viewer starting"
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    let poller = net::spawn_poller(&cfg, tx)?;
    let mut viewer = Viewer::new(cfg, view, poller);
    let mut lines = spawn_stdin_reader();

    loop {
        let event = crossbeam_channel::select! {
            recv(rx) -> msg => msg.map(Event::Incoming).unwrap_or(Event::PollerGone),
            recv(lines) -> line => line.map(Event::Line).unwrap_or(Event::StdinClosed),
        };
        match event {
            Event::Incoming(incoming) => viewer.on_incoming(incoming),
            Event::Line(line) => {
                if viewer.on_command(&line) == Flow::Quit {
                    break;
                }
            }
            Event::StdinClosed => {
                tracing::debug!("stdin closed, continuing with snapshots only");
                lines = crossbeam_channel::never();
            }
            Event::PollerGone => {
                tracing::warn!("poller stopped");
                break;
            }
        }
    }

    viewer.shutdown();
    Ok(())
}
