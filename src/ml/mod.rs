//! Model inference services
//!
//! ONNX models are consumed as black-box operators: token ids in, a tensor
//! of floats out. Tokenization is implemented here (BPE for the language
//! detector, Unigram/Viterbi for the embedder) because the models ship with
//! raw vocabulary assets rather than runtime tokenizers.

use once_cell::sync::OnceCell;
use ort::{GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub mod bpe;
pub mod embedding;
pub mod lang;
pub mod unigram;

pub use embedding::EmbeddingService;
pub use lang::LanguageDetector;

/// Model loading and inference errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Model file missing or unloadable
    #[error("Model load failed: {0}")]
    Load(String),

    /// Tokenizer asset missing or malformed
    #[error("Tokenizer load failed: {0}")]
    Tokenizer(String),

    /// Inference failed
    #[error("Inference failed: {0}")]
    Inference(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error in a tokenizer asset
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load an ONNX session with full graph optimization
pub(crate) fn load_session(path: &Path, intra_threads: usize) -> Result<Session, ModelError> {
    if !path.exists() {
        return Err(ModelError::Load(format!(
            "model file not found: {}",
            path.display()
        )));
    }

    Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|b| b.with_intra_threads(intra_threads))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| ModelError::Load(format!("{}: {}", path.display(), e)))
}

/// One-shot lazily initialized capability.
///
/// The first `get_or_init` runs the initializer exactly once; a failure
/// permanently disables the capability for the process and every later
/// call observes `None`. Successful services are shared read-only.
pub struct LazyService<T> {
    name: &'static str,
    cell: OnceCell<Option<Arc<T>>>,
}

impl<T> LazyService<T> {
    /// Create an uninitialized service slot
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceCell::new(),
        }
    }

    /// Initialize on first use, then return the cached capability
    pub fn get_or_init<F>(&self, init: F) -> Option<Arc<T>>
    where
        F: FnOnce() -> Result<T, ModelError>,
    {
        self.cell
            .get_or_init(|| match init() {
                Ok(service) => {
                    info!("{} enabled", self.name);
                    Some(Arc::new(service))
                }
                Err(e) => {
                    warn!("{} disabled: {}", self.name, e);
                    None
                }
            })
            .clone()
    }

    /// The capability if it was already initialized successfully
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned().flatten()
    }
}
