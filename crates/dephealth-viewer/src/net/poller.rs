//! Periodic snapshot polling on a dedicated runtime thread.
//!
//! One loop owns the timer and performs every fetch itself, so refreshes
//! never overlap. Ticks missed while a fetch is in flight are skipped.

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::net::retry::{with_retry, Backoff};
use crate::net::uds::fetch_snapshot;
use crate::net::Incoming;
use crate::util::config::ViewerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Resume the timer and fetch immediately.
    Live,
    /// Suspend the timer and fetch the snapshot at this RFC 3339 time.
    History(String),
    RefreshNow,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Live,
    History(String),
}

impl Mode {
    fn at(&self) -> Option<String> {
        match self {
            Self::Live => None,
            Self::History(at) => Some(at.clone()),
        }
    }
}

enum Wake {
    Tick,
    Control(Control),
}

pub struct PollerHandle {
    control: mpsc::UnboundedSender<Control>,
}

impl PollerHandle {
    /// Returns `false` once the poller thread has stopped.
    pub fn send(&self, cmd: Control) -> bool {
        self.control.send(cmd).is_ok()
    }

    pub fn shutdown(self) {
        let _ = self.control.send(Control::Shutdown);
    }
}

#[derive(Debug, Clone)]
struct FetchSettings {
    sock_path: String,
    backoff: Backoff,
    timeout: Duration,
}

impl From<&ViewerConfig> for FetchSettings {
    fn from(cfg: &ViewerConfig) -> Self {
        Self {
            sock_path: cfg.socket_path.clone(),
            backoff: Backoff {
                base: Duration::from_millis(cfg.retry_base_ms),
                cap: Duration::from_millis(cfg.retry_cap_ms),
                max_retries: cfg.max_retries,
            },
            timeout: cfg.request_timeout(),
        }
    }
}

pub fn spawn_poller(cfg: &ViewerConfig, tx: Sender<Incoming>) -> Result<PollerHandle> {
    let rt = tokio::runtime::Runtime::new().context("build tokio runtime")?;
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let settings = FetchSettings::from(cfg);
    let period = cfg.poll_interval();

    std::thread::Builder::new()
        .name("dephealth-poller".into())
        .spawn(move || {
            rt.block_on(poll_loop(period, control_rx, move |at| {
                fetch_and_forward(settings.clone(), at, tx.clone())
            }));
        })
        .context("spawn poller thread")?;

    Ok(PollerHandle {
        control: control_tx,
    })
}

async fn fetch_and_forward(settings: FetchSettings, at: Option<String>, tx: Sender<Incoming>) {
    let result = with_retry(&settings.backoff, || async {
        tokio::time::timeout(
            settings.timeout,
            fetch_snapshot(&settings.sock_path, at.as_deref()),
        )
        .await
        .context("snapshot request timed out")?
    })
    .await;

    let incoming = match result {
        Ok(snapshot) => Incoming::snapshot(settings.sock_path, snapshot, at),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "snapshot fetch failed");
            Incoming::error(settings.sock_path, format!("{e:#}"))
        }
    };
    let _ = tx.send(incoming);
}

/// Drives `fetch` from the timer (live mode only) and from control
/// messages, control first. Each fetch completes before the next wake-up
/// is considered.
async fn poll_loop<F, Fut>(period: Duration, mut control: mpsc::UnboundedReceiver<Control>, mut fetch: F)
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut mode = Mode::Live;

    loop {
        let live = mode == Mode::Live;
        let wake = tokio::select! {
            biased;
            cmd = control.recv() => Wake::Control(cmd.unwrap_or(Control::Shutdown)),
            _ = ticker.tick(), if live => Wake::Tick,
        };

        let at = match wake {
            Wake::Tick => None,
            Wake::Control(Control::Shutdown) => break,
            Wake::Control(Control::Live) => {
                if !live {
                    tracing::info!("live mode: polling resumed");
                }
                mode = Mode::Live;
                ticker.reset();
                None
            }
            Wake::Control(Control::History(at)) => {
                tracing::info!(at = %at, "history mode: polling suspended");
                mode = Mode::History(at.clone());
                Some(at)
            }
            Wake::Control(Control::RefreshNow) => mode.at(),
        };
        fetch(at).await;
    }
    tracing::debug!("poller stopped");
}
