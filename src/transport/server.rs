//! Streaming event server
//!
//! Accepts consumers on a Unix socket and pushes every captured
//! [`ClipboardData`] to all of them. A consumer disconnect ends that
//! consumer's stream cleanly; the daemon keeps running.

use super::{socket_path, Result, TransportError};
use crate::monitor::ClipboardData;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Capacity of the fan-out queue; slow consumers lag and drop rather than
/// stall capture
const QUEUE_CAPACITY: usize = 256;

/// Event stream server bound to a Unix socket
pub struct EventServer {
    path: PathBuf,
    listener: UnixListener,
}

impl EventServer {
    /// Bind the listening socket, replacing a stale socket file from a
    /// previous run.
    pub fn bind(address: &str) -> Result<Self> {
        let path = socket_path(address)?;

        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&path).map_err(|source| TransportError::Bind {
            path: path.clone(),
            source,
        })?;

        info!("event stream listening on {}", path.display());
        Ok(Self { path, listener })
    }

    /// Serve until the event source closes. Each accepted consumer gets its
    /// own writer task draining the shared queue.
    pub async fn run(self, mut events: mpsc::Receiver<ClipboardData>) -> Result<()> {
        let (fanout, _) = broadcast::channel::<ClipboardData>(QUEUE_CAPACITY);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, _addr) = accepted?;
                    info!("consumer connected");
                    tokio::spawn(serve_consumer(stream, fanout.subscribe()));
                }
                event = events.recv() => match event {
                    // No receivers is fine; events are simply not retained
                    Some(event) => { let _ = fanout.send(event); }
                    None => {
                        info!("event source closed, shutting down stream server");
                        break;
                    }
                },
            }
        }

        let _ = std::fs::remove_file(&self.path);
        Ok(())
    }
}

/// Drain the queue into one consumer until it disconnects
async fn serve_consumer(stream: UnixStream, mut queue: broadcast::Receiver<ClipboardData>) {
    let (mut reader, mut writer) = stream.into_split();
    let mut probe = [0u8; 64];

    loop {
        tokio::select! {
            event = queue.recv() => match event {
                Ok(event) => {
                    let mut frame = match serde_json::to_vec(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("failed to encode event frame: {}", e);
                            continue;
                        }
                    };
                    frame.push(b'\n');

                    if let Err(e) = writer.write_all(&frame).await {
                        debug!("consumer write failed, closing stream: {}", e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("slow consumer dropped {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            read = reader.read(&mut probe) => match read {
                // Consumers never send payload; any read activity other
                // than EOF is ignored
                Ok(0) | Err(_) => {
                    info!("consumer disconnected");
                    break;
                }
                Ok(_) => {}
            },
        }
    }
}
