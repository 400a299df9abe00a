//! Consuming side of the event stream
//!
//! Connects to the daemon socket and reconnects forever: 5 seconds after an
//! error, 2 seconds after a clean end of stream. The front-end keeps working
//! through indefinite daemon outages.

use super::socket_path;
use crate::monitor::ClipboardData;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Delay before reconnecting after a connection or stream error
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Delay before reconnecting after the daemon closed the stream cleanly
pub const CLEAN_END_BACKOFF: Duration = Duration::from_secs(2);

/// Subscribe to the daemon's event stream.
///
/// Returns a receiver fed by a background reconnect loop. The loop exits
/// when the receiver is dropped. An unparseable address is reported once
/// and yields a stream that never produces events.
pub fn subscribe(address: &str) -> mpsc::Receiver<ClipboardData> {
    let (tx, rx) = mpsc::channel(64);

    match socket_path(address) {
        Ok(path) => {
            tokio::spawn(run_client(path, tx));
        }
        Err(e) => warn!("{}", e),
    }

    rx
}

async fn run_client(path: PathBuf, tx: mpsc::Sender<ClipboardData>) {
    loop {
        match UnixStream::connect(&path).await {
            Ok(stream) => {
                info!("connected to clipboard daemon at {}", path.display());
                match read_stream(stream, &tx).await {
                    Ok(ConsumerEnd::ReceiverDropped) => return,
                    Ok(ConsumerEnd::StreamClosed) => {
                        info!("daemon stream ended, reconnecting shortly");
                        tokio::time::sleep(CLEAN_END_BACKOFF).await;
                    }
                    Err(e) => {
                        warn!("daemon stream error: {}, reconnecting", e);
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                }
            }
            Err(e) => {
                debug!("daemon unavailable ({}), retrying", e);
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }

        if tx.is_closed() {
            return;
        }
    }
}

enum ConsumerEnd {
    /// The daemon closed the stream (status OK)
    StreamClosed,
    /// The front-end dropped its receiver; stop reconnecting
    ReceiverDropped,
}

async fn read_stream(
    stream: UnixStream,
    tx: &mpsc::Sender<ClipboardData>,
) -> std::io::Result<ConsumerEnd> {
    let mut lines = BufReader::new(stream).lines();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ClipboardData>(&line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    return Ok(ConsumerEnd::ReceiverDropped);
                }
            }
            Err(e) => warn!("dropping malformed event frame: {}", e),
        }
    }

    Ok(ConsumerEnd::StreamClosed)
}
