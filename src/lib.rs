//! # ClipStash
//!
//! Clipboard history manager for Linux.
//!
//! ClipStash watches the display-server selection (Wayland `wlr-data-control`
//! or X11 XFixes), streams every copy event from a small capture daemon to a
//! front-end process that deduplicates, classifies, and enriches items with
//! OCR text, a detected programming language, and a dense embedding, then
//! persists everything into a searchable SQLite store.

pub mod classify;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod ml;
pub mod monitor;
pub mod ocr;
pub mod pipeline;
pub mod search;
pub mod store;
pub mod transport;

pub use config::Config;

/// Result type alias for ClipStash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ClipStash operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Selection monitor error
    #[error("Monitor error: {0}")]
    Monitor(#[from] monitor::MonitorError),

    /// Event transport error
    #[error("Transport error: {0}")]
    Transport(#[from] transport::TransportError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    /// Model loading or inference error
    #[error("Model error: {0}")]
    Model(#[from] ml::ModelError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum clipboard payload size accepted by the capture daemon (16MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;
