//! OCR adapter
//!
//! Thin wrapper over Tesseract: encoded image bytes in, recognized text
//! out. Initialization needs a tessdata directory; the user-local one is
//! preferred, with the distro path as fallback. A failed init disables OCR
//! for the rest of the process (handled by the caller's lazy service cell).

use leptess::LepTess;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

/// Distro-provided language data, used when no user-local copy exists
const SYSTEM_TESSDATA: &str = "/usr/share/tessdata";

/// OCR errors
#[derive(Debug, Error)]
pub enum OcrError {
    /// Tesseract could not be initialized with any tessdata directory
    #[error("OCR initialization failed: {0}")]
    Init(String),
}

/// Tesseract-backed OCR engine
pub struct OcrEngine {
    // LepTess mutates internal state per image; serialize access
    api: Mutex<LepTess>,
}

impl OcrEngine {
    /// Initialize with `languages` (e.g. "eng+spa"), trying the user
    /// tessdata directory first and `/usr/share/tessdata` second.
    pub fn new(user_tessdata: &Path, languages: &str) -> Result<Self, OcrError> {
        let candidates = [user_tessdata.to_string_lossy().to_string(), SYSTEM_TESSDATA.to_string()];

        let mut last_error = String::new();
        for datapath in &candidates {
            match LepTess::new(Some(datapath), languages) {
                Ok(api) => {
                    debug!("OCR initialized with tessdata at {}", datapath);
                    return Ok(Self {
                        api: Mutex::new(api),
                    });
                }
                Err(e) => last_error = format!("{}: {}", datapath, e),
            }
        }

        Err(OcrError::Init(last_error))
    }

    /// Extract text from encoded image bytes (PNG expected). Returns an
    /// empty string when the image cannot be decoded or yields no text.
    pub fn extract_text(&self, image: &[u8]) -> String {
        let mut api = match self.api.lock() {
            Ok(api) => api,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Err(e) = api.set_image_from_mem(image) {
            warn!("OCR could not decode image: {}", e);
            return String::new();
        }

        match api.get_utf8_text() {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("OCR text extraction failed: {}", e);
                String::new()
            }
        }
    }
}
