//! [`CockpitServer`] – HTTP + WebSocket server for the live point-cloud view.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`CockpitServer::with_port`]).
//!
//! * Regular HTTP requests → 200 OK with the embedded viewer page.
//! * WebSocket upgrades → a `config` frame, then the latest cloud snapshot
//!   every refresh interval whenever it has changed.

use std::net::SocketAddr;
use std::time::Duration;

use echoscan_types::{CloudSnapshot, ScanError};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Default TCP port for the viewer.
pub const DEFAULT_PORT: u16 = 8080;

/// Default push cadence for WebSocket clients.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Default half-extent of the plotted cube (cm).
pub const DEFAULT_PLOT_BOUND_CM: f64 = 250.0;

/// The compiled-in viewer page (HTML + JS, no external assets).
const VIEWER_HTML: &str = include_str!("viewer.html");

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

/// Serves the viewer page and streams snapshots to every connected browser.
///
/// # Example
///
/// ```rust,no_run
/// use echoscan_cockpit::{CockpitServer, SnapshotChannel};
///
/// #[tokio::main]
/// async fn main() {
///     let channel = SnapshotChannel::new();
///     CockpitServer::new(channel.subscribe())
///         .with_port(8080)
///         .run()
///         .await
///         .expect("cockpit server failed");
/// }
/// ```
pub struct CockpitServer {
    snapshots: watch::Receiver<CloudSnapshot>,
    port: u16,
    refresh_interval: Duration,
    plot_bound_cm: f64,
}

#[derive(Clone)]
struct ClientSettings {
    refresh_interval: Duration,
    plot_bound_cm: f64,
}

impl CockpitServer {
    /// Create a server reading from `snapshots` on the [`DEFAULT_PORT`].
    pub fn new(snapshots: watch::Receiver<CloudSnapshot>) -> Self {
        Self {
            snapshots,
            port: DEFAULT_PORT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            plot_bound_cm: DEFAULT_PLOT_BOUND_CM,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_plot_bound(mut self, bound_cm: f64) -> Self {
        self.plot_bound_cm = bound_cm;
        self
    }

    /// Return the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind `0.0.0.0:<port>` and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Render`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), ScanError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ScanError::Render(format!("cockpit bind error on {addr}: {e}")))?;
        info!(port = self.port, "cockpit viewer listening on http://localhost:{}", self.port);
        self.serve(listener).await
    }

    /// Serve connections from an already bound `listener`.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ScanError> {
        let settings = ClientSettings {
            refresh_interval: self.refresh_interval,
            plot_bound_cm: self.plot_bound_cm,
        };
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let snapshots = self.snapshots.clone();
                    let settings = settings.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, snapshots, settings).await {
                            warn!(peer = %peer, error = %e, "cockpit client error");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "cockpit accept error");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    snapshots: watch::Receiver<CloudSnapshot>,
    settings: ClientSettings,
) -> Result<(), ScanError> {
    // `peek` leaves the request in the socket for tungstenite's handshake.
    let mut buf = [0u8; 1024];
    let n = stream
        .peek(&mut buf)
        .await
        .map_err(|e| ScanError::Render(format!("peek error from {peer}: {e}")))?;

    let header_preview = String::from_utf8_lossy(&buf[..n]);
    let is_ws_upgrade = header_preview.lines().any(|line| {
        let line = line.to_lowercase();
        line.starts_with("upgrade:") && line.contains("websocket")
    });

    if is_ws_upgrade {
        handle_ws(stream, peer, snapshots, settings).await
    } else {
        serve_html(stream, settings.plot_bound_cm).await
    }
}

// ---------------------------------------------------------------------------
// Plain HTTP: serve the embedded viewer
// ---------------------------------------------------------------------------

fn viewer_page(plot_bound_cm: f64) -> String {
    VIEWER_HTML.replace("__PLOT_BOUND__", &plot_bound_cm.to_string())
}

async fn serve_html(mut stream: TcpStream, plot_bound_cm: f64) -> Result<(), ScanError> {
    // Drain the request so closing the socket does not reset the client.
    let mut request = [0u8; 2048];
    let _ = stream.read(&mut request).await;

    let body = viewer_page(plot_bound_cm);
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| ScanError::Render(format!("HTTP write error: {e}")))?;
    let _ = stream.shutdown().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// WebSocket: snapshot stream
// ---------------------------------------------------------------------------

/// JSON frame sent once per connection.
pub(crate) fn config_frame(plot_bound_cm: f64) -> String {
    json!({ "type": "config", "plot_bound_cm": plot_bound_cm }).to_string()
}

/// JSON frame carrying one snapshot; points are `[x, y, z]` triples.
pub(crate) fn cloud_frame(snapshot: &CloudSnapshot) -> String {
    let points: Vec<[f64; 3]> = snapshot.points.iter().map(|p| [p.x, p.y, p.z]).collect();
    json!({
        "type": "cloud",
        "seq": snapshot.seq,
        "taken_at": snapshot.taken_at.to_rfc3339(),
        "points": points,
    })
    .to_string()
}

async fn handle_ws(
    stream: TcpStream,
    peer: SocketAddr,
    mut snapshots: watch::Receiver<CloudSnapshot>,
    settings: ClientSettings,
) -> Result<(), ScanError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ScanError::Render(format!("ws handshake from {peer}: {e}")))?;
    debug!(peer = %peer, "cockpit viewer attached");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    if ws_tx
        .send(Message::Text(config_frame(settings.plot_bound_cm).into()))
        .await
        .is_err()
    {
        return Ok(());
    }

    // Send whatever is current on the first tick.
    snapshots.mark_changed();
    let mut ticker = tokio::time::interval(settings.refresh_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match snapshots.has_changed() {
                    Ok(true) => {
                        let frame = cloud_frame(&snapshots.borrow_and_update());
                        if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(false) => {}
                    // Producer is gone; nothing more will ever arrive.
                    Err(_) => break,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    debug!(peer = %peer, "cockpit viewer detached");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
