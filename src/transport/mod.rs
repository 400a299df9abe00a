//! Event transport between the capture daemon and the front-end
//!
//! A unidirectional stream of [`ClipboardData`] frames over a local Unix
//! socket. The daemon pushes newline-delimited JSON frames to every
//! connected consumer; consumers reconnect with backoff and survive
//! indefinite daemon outages.

use std::path::PathBuf;
use thiserror::Error;

pub mod client;
pub mod server;

pub use client::{subscribe, CLEAN_END_BACKOFF, ERROR_BACKOFF};
pub use server::EventServer;

/// Default stream address, shared by daemon and front-end
pub const DEFAULT_ADDRESS: &str = "unix:///tmp/clipboard-daemon.sock";

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Malformed or unsupported address
    #[error("Invalid transport address '{0}': only unix:// addresses are supported")]
    InvalidAddress(String),

    /// Could not bind the listening socket
    #[error("Failed to bind {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Frame serialization error
    #[error("Frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Extract the filesystem path from a `unix://` address
pub fn socket_path(address: &str) -> Result<PathBuf> {
    address
        .strip_prefix("unix://")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| TransportError::InvalidAddress(address.to_string()))
}
