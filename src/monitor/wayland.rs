//! Wayland selection monitor
//!
//! Watches clipboard ownership changes through the `wlr-data-control`
//! protocol. The compositor must advertise `zwlr_data_control_manager_v1`
//! version 2 and a seat; anything less is a startup failure.

use super::{
    classify_mime, current_timestamp, ClipboardData, EventSink, MimeSelection, MonitorError,
    SelectionMonitor,
};
use crate::MAX_PAYLOAD_SIZE;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::io::Read;
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use wayland_client::{
    event_created_child,
    globals::{registry_queue_init, BindError, GlobalListContents},
    protocol::{wl_registry, wl_seat::WlSeat},
    Connection, Dispatch, EventQueue, QueueHandle,
};
use wayland_protocols_wlr::data_control::v1::client::{
    zwlr_data_control_device_v1::{self, ZwlrDataControlDeviceV1},
    zwlr_data_control_manager_v1::ZwlrDataControlManagerV1,
    zwlr_data_control_offer_v1::{self, ZwlrDataControlOfferV1},
};

/// Bounded retry budget for the non-blocking pipe read
const READ_ATTEMPTS: u32 = 10;

/// Sleep between read attempts while the source app fills the pipe
const READ_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Poll timeout so the stop flag is honored promptly
const POLL_TIMEOUT_MS: u16 = 100;

/// A selection waiting to be read once control returns to the event loop
struct PendingSelection {
    offer: ZwlrDataControlOfferV1,
    mime: String,
}

/// Per-connection listener state
struct MonitorState {
    mime: MimeSelection,
    pending: Option<PendingSelection>,
    finished: bool,
}

/// Wayland selection monitor
pub struct WaylandMonitor {
    conn: Connection,
    event_queue: EventQueue<MonitorState>,
    state: MonitorState,
    // Held for the lifetime of the connection; dropping them would tear
    // down the data control device.
    _seat: WlSeat,
    _manager: ZwlrDataControlManagerV1,
    _device: ZwlrDataControlDeviceV1,
}

impl WaylandMonitor {
    /// Connect to the compositor and bind the data control device
    pub fn new() -> Result<Self, MonitorError> {
        let conn = Connection::connect_to_env()
            .map_err(|e| MonitorError::Connection(format!("wayland connect failed: {}", e)))?;

        let (globals, mut event_queue) = registry_queue_init::<MonitorState>(&conn)
            .map_err(|e| MonitorError::Connection(format!("registry init failed: {}", e)))?;
        let qh = event_queue.handle();

        let seat: WlSeat = globals.bind(&qh, 1..=7, ()).map_err(|e| match e {
            BindError::NotPresentInRegistry => {
                MonitorError::ProtocolMissing("wl_seat".to_string())
            }
            other => MonitorError::Connection(format!("wl_seat bind failed: {}", other)),
        })?;

        let manager: ZwlrDataControlManagerV1 =
            globals.bind(&qh, 2..=2, ()).map_err(|e| match e {
                BindError::NotPresentInRegistry | BindError::UnsupportedVersion => {
                    MonitorError::ProtocolMissing("zwlr_data_control_manager_v1 (>= v2)".to_string())
                }
            })?;

        let device = manager.get_data_device(&seat, &qh, ());

        let mut state = MonitorState {
            mime: MimeSelection::default(),
            pending: None,
            finished: false,
        };

        // Drain the initial burst so the current selection (if any) is seen
        event_queue
            .roundtrip(&mut state)
            .map_err(|e| MonitorError::Connection(format!("initial roundtrip failed: {}", e)))?;

        info!("Wayland monitor initialized (wlr-data-control v2)");

        Ok(Self {
            conn,
            event_queue,
            state,
            _seat: seat,
            _manager: manager,
            _device: device,
        })
    }
}

impl SelectionMonitor for WaylandMonitor {
    fn run(&mut self, sink: EventSink, stop: Arc<AtomicBool>) -> Result<(), MonitorError> {
        info!("Wayland monitor started");

        while !stop.load(Ordering::Relaxed) {
            self.event_queue
                .dispatch_pending(&mut self.state)
                .map_err(|e| MonitorError::Disconnected(format!("dispatch failed: {}", e)))?;

            // Selections are recorded by the listener and read here, where
            // dispatching the queue between pipe reads is allowed.
            if let Some(pending) = self.state.pending.take() {
                handle_selection(
                    &self.conn,
                    &mut self.event_queue,
                    &mut self.state,
                    pending,
                    &sink,
                );
            }

            if self.state.finished {
                return Err(MonitorError::Disconnected(
                    "data control device finished".to_string(),
                ));
            }

            self.event_queue
                .flush()
                .map_err(|e| MonitorError::Disconnected(format!("flush failed: {}", e)))?;

            let Some(guard) = self.conn.prepare_read() else {
                // Events already queued; dispatch on the next iteration
                continue;
            };

            let fd = guard.connection_fd();
            let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(POLL_TIMEOUT_MS)) {
                Ok(n) if n > 0 => {
                    if let Err(e) = guard.read() {
                        return Err(MonitorError::Disconnected(format!("read failed: {}", e)));
                    }
                }
                Ok(_) => {
                    // Timeout: drop the guard to cancel the read
                }
                Err(nix::errno::Errno::EINTR) => {}
                Err(e) => {
                    return Err(MonitorError::Disconnected(format!("poll failed: {}", e)));
                }
            }
        }

        info!("Wayland monitor stopped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Wayland"
    }
}

/// Read the pending selection and emit it. Transient failures drop the
/// event and keep the loop alive.
fn handle_selection(
    conn: &Connection,
    event_queue: &mut EventQueue<MonitorState>,
    state: &mut MonitorState,
    pending: PendingSelection,
    sink: &EventSink,
) {
    debug!("clipboard changed, negotiated MIME {}", pending.mime);

    let data = match read_offer(conn, event_queue, state, &pending.offer, &pending.mime) {
        Ok(data) => data,
        Err(e) => {
            warn!("failed to read selection ({}): {}", pending.mime, e);
            pending.offer.destroy();
            return;
        }
    };
    pending.offer.destroy();

    if data.is_empty() {
        debug!("empty selection payload, ignoring");
        return;
    }

    debug!("read {} bytes from selection", data.len());

    let event = ClipboardData {
        content_type: classify_mime(&pending.mime),
        data,
        source_app: "wayland".to_string(),
        window_title: "wayland".to_string(),
        timestamp: current_timestamp(),
        mime_type: pending.mime,
    };

    if sink.blocking_send(event).is_err() {
        warn!("event sink closed, dropping selection");
    }
}

/// Transfer the offer payload through a non-blocking pipe.
///
/// The write end goes to the selection owner via `receive`; the read end is
/// drained in a bounded retry loop, dispatching display events between
/// attempts so the compositor can forward the transfer.
fn read_offer(
    conn: &Connection,
    event_queue: &mut EventQueue<MonitorState>,
    state: &mut MonitorState,
    offer: &ZwlrDataControlOfferV1,
    mime: &str,
) -> Result<Vec<u8>, MonitorError> {
    let (read_fd, write_fd) =
        nix::unistd::pipe().map_err(|e| MonitorError::Read(format!("pipe failed: {}", e)))?;

    fcntl(&read_fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK))
        .map_err(|e| MonitorError::Read(format!("fcntl failed: {}", e)))?;

    offer.receive(mime.to_string(), write_fd.as_fd());
    conn.flush()
        .map_err(|e| MonitorError::Disconnected(format!("flush failed: {}", e)))?;
    drop(write_fd);

    let mut pipe = std::fs::File::from(read_fd);
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];

    for _attempt in 0..READ_ATTEMPTS {
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => return Ok(out),
                Ok(n) => {
                    out.extend_from_slice(&buf[..n]);
                    if out.len() > MAX_PAYLOAD_SIZE {
                        return Err(MonitorError::Read(format!(
                            "payload exceeds {} bytes",
                            MAX_PAYLOAD_SIZE
                        )));
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(MonitorError::Read(format!("pipe read failed: {}", e))),
            }
        }

        if !out.is_empty() {
            break;
        }

        // Let the compositor make progress on the transfer
        event_queue
            .dispatch_pending(state)
            .map_err(|e| MonitorError::Disconnected(format!("dispatch failed: {}", e)))?;
        std::thread::sleep(READ_RETRY_DELAY);
    }

    Ok(out)
}

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for MonitorState {
    fn event(
        _state: &mut Self,
        _registry: &wl_registry::WlRegistry,
        _event: wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        // Globals are resolved once at startup; runtime changes are ignored
    }
}

impl Dispatch<WlSeat, ()> for MonitorState {
    fn event(
        _state: &mut Self,
        _seat: &WlSeat,
        _event: <WlSeat as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        // Seat capabilities are irrelevant for data control
    }
}

impl Dispatch<ZwlrDataControlManagerV1, ()> for MonitorState {
    fn event(
        _state: &mut Self,
        _manager: &ZwlrDataControlManagerV1,
        _event: <ZwlrDataControlManagerV1 as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        // The manager has no events
    }
}

impl Dispatch<ZwlrDataControlDeviceV1, ()> for MonitorState {
    fn event(
        state: &mut Self,
        _device: &ZwlrDataControlDeviceV1,
        event: zwlr_data_control_device_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_data_control_device_v1::Event::DataOffer { id: _ } => {
                debug!("new clipboard offer");
                state.mime.clear();
            }
            zwlr_data_control_device_v1::Event::Selection { id } => {
                // Replace any unread selection with the newest one
                if let Some(stale) = state.pending.take() {
                    stale.offer.destroy();
                }

                match id {
                    Some(offer) => match state.mime.chosen() {
                        Some(mime) => {
                            state.pending = Some(PendingSelection {
                                offer,
                                mime: mime.to_string(),
                            });
                        }
                        None => {
                            debug!(
                                "no acceptable MIME among {:?}, ignoring selection",
                                state.mime.offered()
                            );
                            offer.destroy();
                        }
                    },
                    None => debug!("selection cleared"),
                }
            }
            zwlr_data_control_device_v1::Event::PrimarySelection { id } => {
                // Middle-click selection is out of scope
                if let Some(offer) = id {
                    offer.destroy();
                }
            }
            zwlr_data_control_device_v1::Event::Finished => {
                state.finished = true;
            }
            _ => {}
        }
    }

    event_created_child!(MonitorState, ZwlrDataControlDeviceV1, [
        zwlr_data_control_device_v1::EVT_DATA_OFFER_OPCODE => (ZwlrDataControlOfferV1, ()),
    ]);
}

impl Dispatch<ZwlrDataControlOfferV1, ()> for MonitorState {
    fn event(
        state: &mut Self,
        _offer: &ZwlrDataControlOfferV1,
        event: zwlr_data_control_offer_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let zwlr_data_control_offer_v1::Event::Offer { mime_type } = event {
            state.mime.offer(&mime_type);
        }
    }
}
