use anyhow::{Context, Result};
use dephealth_core::{Msg, Snapshot};
use futures_util::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Requests one snapshot (live, or at `at`) from the feed socket.
///
/// Frames that fail to decode are logged and skipped; the feed may keep
/// talking after a bad frame.
pub async fn fetch_snapshot(sock_path: &str, at: Option<&str>) -> Result<Snapshot> {
    let stream = UnixStream::connect(sock_path)
        .await
        .with_context(|| format!("connect UDS {sock_path}"))?;
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    let request = Msg::RequestSnapshot {
        at: at.map(str::to_string),
    };
    framed
        .send(Bytes::from(serde_json::to_vec(&request)?))
        .await
        .context("send snapshot request")?;

    while let Some(frame) = framed.next().await {
        let bytes = frame.context("read frame")?;
        let msg = match serde_json::from_slice::<Msg>(&bytes) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, len = bytes.len(), "skipping undecodable frame");
                continue;
            }
        };
        match msg {
            Msg::Snapshot { snapshot } => return Ok(snapshot),
            Msg::Error { message } => anyhow::bail!("feed error: {message}"),
            Msg::Ping => {
                framed.send(Bytes::from(serde_json::to_vec(&Msg::Pong)?)).await?;
            }
            Msg::Hello { .. } | Msg::Pong | Msg::RequestSnapshot { .. } => {}
        }
    }
    anyhow::bail!("feed closed the connection before sending a snapshot")
}
