//! Capture daemon
//!
//! Wires the selection monitor to the event stream server: the monitor
//! runs on its own OS thread and feeds a bounded queue; the server drains
//! the queue to every connected consumer. SIGINT and SIGTERM stop the
//! daemon cleanly with exit code 0.

use crate::monitor::{self, ClipboardData};
use crate::transport::EventServer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Bounded capture queue between the monitor thread and the stream server
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Run the capture daemon until a termination signal arrives.
///
/// Fails immediately when the display backend cannot bind its required
/// protocol or the stream address cannot be bound.
pub async fn run(address: &str) -> crate::Result<()> {
    let mut selection_monitor = monitor::create_monitor()?;
    info!("capture backend: {}", selection_monitor.name());

    let server = EventServer::bind(address)?;

    let stop = Arc::new(AtomicBool::new(false));
    let (event_tx, event_rx) = mpsc::channel::<ClipboardData>(EVENT_QUEUE_CAPACITY);

    let monitor_stop = Arc::clone(&stop);
    let monitor_thread = std::thread::Builder::new()
        .name("selection-monitor".to_string())
        .spawn(move || {
            if let Err(e) = selection_monitor.run(event_tx, monitor_stop) {
                error!("selection monitor terminated: {}", e);
            }
        })?;

    let server_task = tokio::spawn(server.run(event_rx));

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        result = server_task => {
            match result {
                Ok(Ok(())) => info!("stream server stopped"),
                Ok(Err(e)) => error!("stream server failed: {}", e),
                Err(e) => error!("stream server task panicked: {}", e),
            }
        }
    }

    // The monitor observes the flag within one poll interval (100 ms)
    stop.store(true, Ordering::Relaxed);
    let _ = tokio::task::spawn_blocking(move || monitor_thread.join()).await;

    info!("clipboard daemon stopped");
    Ok(())
}
