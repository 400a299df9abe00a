//! Selection monitoring for Wayland and X11
//!
//! This module provides a backend-agnostic interface over the two display
//! server protocols. One backend is selected at daemon startup: Wayland when
//! `WAYLAND_DISPLAY` is set or `XDG_SESSION_TYPE=wayland`, otherwise X11.

use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod wayland;
pub mod x11;

/// Content classification carried on the wire alongside the raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    /// MIME type could not be classified
    Unknown,
    /// Plain or generic text
    Text,
    /// Encoded image bytes
    Image,
    /// HTML markup (treated as text downstream)
    Html,
    /// File reference (treated as text downstream)
    File,
}

/// A single captured selection change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardData {
    /// Raw payload bytes
    pub data: Vec<u8>,
    /// Best-effort source application name
    pub source_app: String,
    /// Best-effort window title
    pub window_title: String,
    /// Capture time in seconds since the epoch
    pub timestamp: i64,
    /// MIME type as negotiated with the selection owner
    pub mime_type: String,
    /// Classified content kind
    pub content_type: ContentKind,
}

/// Classify a MIME type string into a [`ContentKind`].
///
/// `text/html` wins over the generic `text/*` rule; the X11 legacy atoms
/// (`UTF8_STRING`, `STRING`, `TEXT`) count as text.
pub fn classify_mime(mime: &str) -> ContentKind {
    if mime == "text/html" {
        ContentKind::Html
    } else if mime.starts_with("text/") || matches!(mime, "UTF8_STRING" | "STRING" | "TEXT") {
        ContentKind::Text
    } else if mime.starts_with("image/") {
        ContentKind::Image
    } else {
        ContentKind::Unknown
    }
}

/// Metadata/control MIME types that are never chosen for transfer
fn is_metadata_mime(mime: &str) -> bool {
    matches!(mime, "SAVE_TARGETS" | "TARGETS" | "MULTIPLE" | "TIMESTAMP")
        || mime.starts_with("chromium/")
}

/// Priority rank of a MIME type. Higher wins; rank 0 is never chosen.
fn mime_rank(mime: &str) -> u8 {
    if is_metadata_mime(mime) {
        0
    } else if mime.starts_with("image/") {
        5
    } else if mime == "text/plain" || mime == "text/plain;charset=utf-8" {
        4
    } else if matches!(mime, "UTF8_STRING" | "STRING" | "TEXT") {
        3
    } else if mime.starts_with("text/") {
        2
    } else {
        1
    }
}

/// Tracks the preferred MIME type across the `offer` events of a single
/// data offer.
///
/// A candidate replaces the current choice only on a strictly higher rank,
/// so the chosen MIME is a function of the offered set alone, independent
/// of offer order, and an image choice is sticky for the offer's lifetime.
#[derive(Debug, Default, Clone)]
pub struct MimeSelection {
    chosen: Option<String>,
    offered: Vec<String>,
}

impl MimeSelection {
    /// Reset for a fresh data offer
    pub fn clear(&mut self) {
        self.chosen = None;
        self.offered.clear();
    }

    /// Feed one offered MIME type
    pub fn offer(&mut self, mime: &str) {
        self.offered.push(mime.to_string());

        let rank = mime_rank(mime);
        if rank == 0 {
            return;
        }

        let current_rank = self.chosen.as_deref().map(mime_rank).unwrap_or(0);
        if rank > current_rank {
            self.chosen = Some(mime.to_string());
        }
    }

    /// The negotiated MIME type, if any acceptable one was offered
    pub fn chosen(&self) -> Option<&str> {
        self.chosen.as_deref()
    }

    /// All MIME types seen on this offer
    pub fn offered(&self) -> &[String] {
        &self.offered
    }
}

/// Sink the monitor delivers events into. The monitor runs on a dedicated
/// OS thread and uses `blocking_send`; a full queue applies backpressure to
/// the capture loop.
pub type EventSink = mpsc::Sender<ClipboardData>;

/// A selection monitor backend. `run` blocks the calling thread until the
/// stop flag is raised or the display connection is lost.
pub trait SelectionMonitor: Send {
    /// Run the capture loop, delivering events into `sink`
    fn run(&mut self, sink: EventSink, stop: Arc<AtomicBool>) -> Result<(), MonitorError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Selection monitor errors
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Required display protocol is unavailable
    #[error("Required protocol missing: {0}")]
    ProtocolMissing(String),

    /// Could not connect to the display server
    #[error("Display connection failed: {0}")]
    Connection(String),

    /// Display connection was lost while running
    #[error("Display connection lost: {0}")]
    Disconnected(String),

    /// Transient failure reading a selection payload
    #[error("Selection read failed: {0}")]
    Read(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// True when the session environment points at a Wayland compositor
pub fn is_wayland_session() -> bool {
    std::env::var("WAYLAND_DISPLAY").is_ok()
        || std::env::var("XDG_SESSION_TYPE")
            .map(|v| v == "wayland")
            .unwrap_or(false)
}

/// Create the selection monitor for the current session.
///
/// Fails fast when the selected backend cannot bind its required protocol;
/// the daemon surfaces this as a startup error.
pub fn create_monitor() -> Result<Box<dyn SelectionMonitor>, MonitorError> {
    if is_wayland_session() {
        Ok(Box::new(wayland::WaylandMonitor::new()?))
    } else {
        Ok(Box::new(x11::X11Monitor::new()?))
    }
}

/// Current time in seconds since the epoch
pub(crate) fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choose(mimes: &[&str]) -> Option<String> {
        let mut sel = MimeSelection::default();
        for m in mimes {
            sel.offer(m);
        }
        sel.chosen().map(|s| s.to_string())
    }

    #[test]
    fn test_image_beats_everything() {
        assert_eq!(
            choose(&["TARGETS", "image/png", "text/plain"]),
            Some("image/png".to_string())
        );
        assert_eq!(
            choose(&["text/plain", "image/png"]),
            Some("image/png".to_string())
        );
    }

    #[test]
    fn test_image_is_sticky() {
        let mut sel = MimeSelection::default();
        sel.offer("image/png");
        sel.offer("image/jpeg");
        // First image wins; later images never override
        assert_eq!(sel.chosen(), Some("image/png"));
    }

    #[test]
    fn test_text_plain_beats_legacy_atoms() {
        assert_eq!(
            choose(&["UTF8_STRING", "text/plain;charset=utf-8"]),
            Some("text/plain;charset=utf-8".to_string())
        );
        assert_eq!(
            choose(&["text/plain", "UTF8_STRING"]),
            Some("text/plain".to_string())
        );
    }

    #[test]
    fn test_legacy_atoms_beat_other_text() {
        assert_eq!(
            choose(&["text/html", "UTF8_STRING"]),
            Some("UTF8_STRING".to_string())
        );
    }

    #[test]
    fn test_metadata_never_chosen() {
        assert_eq!(choose(&["TARGETS", "TIMESTAMP", "chromium/x-web-custom-data"]), None);
        assert_eq!(
            choose(&["SAVE_TARGETS", "application/x-thing"]),
            Some("application/x-thing".to_string())
        );
    }

    #[test]
    fn test_choice_independent_of_offer_order_across_tiers() {
        let mimes = ["TARGETS", "image/png", "text/plain", "UTF8_STRING", "text/html"];
        let mut perms: Vec<Vec<&str>> = Vec::new();
        // A handful of distinct rotations is enough to catch order dependence
        for i in 0..mimes.len() {
            let mut rotated = mimes.to_vec();
            rotated.rotate_left(i);
            perms.push(rotated);
        }
        for perm in perms {
            assert_eq!(choose(&perm), Some("image/png".to_string()));
        }
    }

    #[test]
    fn test_first_offer_wins_within_a_tier() {
        // Equal-rank candidates never replace the current choice, so
        // within one tier the first arrival sticks
        assert_eq!(
            choose(&["text/plain", "text/plain;charset=utf-8"]),
            Some("text/plain".to_string())
        );
        assert_eq!(
            choose(&["text/plain;charset=utf-8", "text/plain"]),
            Some("text/plain;charset=utf-8".to_string())
        );
        assert_eq!(
            choose(&["UTF8_STRING", "STRING", "TEXT"]),
            Some("UTF8_STRING".to_string())
        );
        assert_eq!(
            choose(&["TEXT", "STRING", "UTF8_STRING"]),
            Some("TEXT".to_string())
        );
    }

    #[test]
    fn test_classify_mime() {
        assert_eq!(classify_mime("text/plain"), ContentKind::Text);
        assert_eq!(classify_mime("UTF8_STRING"), ContentKind::Text);
        assert_eq!(classify_mime("image/png"), ContentKind::Image);
        assert_eq!(classify_mime("text/html"), ContentKind::Html);
        assert_eq!(classify_mime("application/zip"), ContentKind::Unknown);
    }
}
