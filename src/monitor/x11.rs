//! X11 selection monitor
//!
//! Subscribes to XFixes `SetSelectionOwnerNotify` on the CLIPBOARD atom
//! from a 1x1 helper window and converts the selection to `UTF8_STRING`
//! on every ownership change.

use super::{current_timestamp, ClipboardData, ContentKind, EventSink, MonitorError, SelectionMonitor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xfixes::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt as _, CreateWindowAux, WindowClass};
use x11rb::protocol::{ErrorKind, Event};
use x11rb::rust_connection::RustConnection;

/// Hard timeout waiting for the selection owner to answer a conversion
const CONVERSION_TIMEOUT: Duration = Duration::from_secs(1);

/// Idle sleep between event polls
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// X11 selection monitor
pub struct X11Monitor {
    conn: RustConnection,
    window: u32,
    clipboard_atom: u32,
    utf8_string_atom: u32,
    png_atom: u32,
}

impl X11Monitor {
    /// Open the display, verify XFixes, and subscribe to selection changes
    pub fn new() -> Result<Self, MonitorError> {
        let (conn, screen_num) = x11rb::connect(None)
            .map_err(|e| MonitorError::Connection(format!("failed to open X display: {}", e)))?;

        conn.extension_information(xfixes::X11_EXTENSION_NAME)
            .map_err(|e| MonitorError::Connection(format!("extension query failed: {}", e)))?
            .ok_or_else(|| MonitorError::ProtocolMissing("XFixes".to_string()))?;

        conn.xfixes_query_version(5, 0)
            .map_err(|e| MonitorError::Connection(format!("xfixes version request: {}", e)))?
            .reply()
            .map_err(|_| MonitorError::ProtocolMissing("XFixes".to_string()))?;

        let screen = &conn.setup().roots[screen_num];

        // 1x1 invisible helper window; only used as a property landing pad
        let window = conn
            .generate_id()
            .map_err(|e| MonitorError::Connection(format!("id allocation failed: {}", e)))?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            screen.root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new(),
        )
        .map_err(|e| MonitorError::Connection(format!("window creation failed: {}", e)))?;

        let clipboard_atom = Self::intern_atom(&conn, "CLIPBOARD")?;
        let utf8_string_atom = Self::intern_atom(&conn, "UTF8_STRING")?;
        let png_atom = Self::intern_atom(&conn, "image/png")?;

        xfixes::select_selection_input(
            &conn,
            window,
            clipboard_atom,
            xfixes::SelectionEventMask::SET_SELECTION_OWNER,
        )
        .map_err(|e| MonitorError::Connection(format!("selection subscribe failed: {}", e)))?;

        conn.flush()
            .map_err(|e| MonitorError::Connection(format!("flush failed: {}", e)))?;

        info!("X11 monitor initialized (XFixes selection notify)");

        Ok(Self {
            conn,
            window,
            clipboard_atom,
            utf8_string_atom,
            png_atom,
        })
    }

    fn intern_atom(conn: &RustConnection, name: &str) -> Result<u32, MonitorError> {
        Ok(conn
            .intern_atom(false, name.as_bytes())
            .map_err(|e| MonitorError::Connection(format!("intern_atom failed: {}", e)))?
            .reply()
            .map_err(|e| MonitorError::Connection(format!("intern_atom reply failed: {}", e)))?
            .atom)
    }

    /// Convert the CLIPBOARD selection to UTF8_STRING and read the result
    fn read_clipboard(&self) -> Result<ClipboardData, MonitorError> {
        self.conn
            .convert_selection(
                self.window,
                self.clipboard_atom,
                self.utf8_string_atom,
                self.clipboard_atom,
                x11rb::CURRENT_TIME,
            )
            .map_err(|e| MonitorError::Read(format!("convert_selection failed: {}", e)))?;
        self.conn
            .flush()
            .map_err(|e| MonitorError::Disconnected(format!("flush failed: {}", e)))?;

        // Wait for the owner to answer with SelectionNotify
        let deadline = Instant::now() + CONVERSION_TIMEOUT;
        loop {
            match self
                .conn
                .poll_for_event()
                .map_err(|e| MonitorError::Disconnected(format!("event poll failed: {}", e)))?
            {
                Some(Event::SelectionNotify(notify)) if notify.requestor == self.window => {
                    if notify.property == x11rb::NONE {
                        return Err(MonitorError::Read(
                            "selection conversion refused by owner".to_string(),
                        ));
                    }
                    break;
                }
                Some(Event::Error(e)) => {
                    // Owner window may vanish mid-conversion
                    if e.error_kind != ErrorKind::Window {
                        warn!("X11 error while converting selection: {:?}", e.error_kind);
                    }
                }
                Some(_) => {}
                None => {
                    if Instant::now() >= deadline {
                        return Err(MonitorError::Read(
                            "timeout waiting for clipboard data".to_string(),
                        ));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }

        let reply = self
            .conn
            .get_property(
                false,
                self.window,
                self.clipboard_atom,
                AtomEnum::ANY,
                0,
                u32::MAX,
            )
            .map_err(|e| MonitorError::Read(format!("get_property failed: {}", e)))?
            .reply()
            .map_err(|e| MonitorError::Read(format!("property read failed: {}", e)))?;

        if reply.value.is_empty() {
            return Err(MonitorError::Read("empty clipboard property".to_string()));
        }

        // Classify by the atom the owner actually returned
        let (mime_type, content_type) = if reply.type_ == self.utf8_string_atom
            || reply.type_ == u32::from(AtomEnum::STRING)
        {
            ("text/plain".to_string(), ContentKind::Text)
        } else if reply.type_ == self.png_atom {
            ("image/png".to_string(), ContentKind::Image)
        } else {
            ("application/octet-stream".to_string(), ContentKind::Unknown)
        };

        Ok(ClipboardData {
            data: reply.value,
            source_app: "clipboard".to_string(),
            window_title: "clipboard".to_string(),
            timestamp: current_timestamp(),
            mime_type,
            content_type,
        })
    }
}

impl SelectionMonitor for X11Monitor {
    fn run(&mut self, sink: EventSink, stop: Arc<AtomicBool>) -> Result<(), MonitorError> {
        info!("X11 monitor started");

        while !stop.load(Ordering::Relaxed) {
            match self
                .conn
                .poll_for_event()
                .map_err(|e| MonitorError::Disconnected(format!("event poll failed: {}", e)))?
            {
                Some(Event::XfixesSelectionNotify(notify))
                    if notify.selection == self.clipboard_atom =>
                {
                    debug!("clipboard owner changed");
                    match self.read_clipboard() {
                        Ok(event) => {
                            if sink.blocking_send(event).is_err() {
                                warn!("event sink closed, dropping selection");
                            }
                        }
                        Err(e) => warn!("failed to read clipboard: {}", e),
                    }
                }
                Some(Event::Error(e)) => {
                    // BadWindow is expected when a source window closes
                    // before we finish talking to it
                    if e.error_kind != ErrorKind::Window {
                        warn!("X11 error: {:?}", e.error_kind);
                    }
                }
                Some(_) => {}
                None => std::thread::sleep(POLL_INTERVAL),
            }
        }

        info!("X11 monitor stopped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "X11"
    }
}
