//! Enrichment pipeline
//!
//! Consumes the daemon's event stream: deduplicate, classify, insert, then
//! fan out independent background tasks for language detection, embedding
//! generation, and OCR. Each task reloads the row before writing back, so
//! concurrent completions converge field by field instead of clobbering
//! whole rows. The inbound callback itself never blocks on inference.

use crate::classify::{detect_code_language, is_url_like};
use crate::config::Config;
use crate::ml::{EmbeddingService, LanguageDetector, LazyService, ModelError};
use crate::monitor::{ClipboardData, ContentKind};
use crate::ocr::OcrEngine;
use crate::store::{ClipboardItem, ItemKind, Store};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub mod notify;

pub use notify::UpdateNotifier;

/// Lazily-initialized model capabilities shared by every enrichment task.
///
/// Each service is initialized exactly once on first use; a failed
/// initialization disables that capability for the remainder of the
/// process without affecting the others.
pub struct Services {
    config: Config,
    ocr: LazyService<OcrEngine>,
    detector: LazyService<LanguageDetector>,
    embedder: LazyService<EmbeddingService>,
}

impl Services {
    /// Create the (still uninitialized) service set
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ocr: LazyService::new("OCR service"),
            detector: LazyService::new("language detector"),
            embedder: LazyService::new("embedding service"),
        }
    }

    /// OCR capability, initializing on first use
    pub fn ocr(&self) -> Option<Arc<OcrEngine>> {
        self.ocr.get_or_init(|| {
            OcrEngine::new(
                &self.config.tessdata_dir(),
                &self.config.models.ocr_languages,
            )
            .map_err(|e| ModelError::Load(e.to_string()))
        })
    }

    /// Language detection capability, initializing on first use
    pub fn detector(&self) -> Option<Arc<LanguageDetector>> {
        self.detector.get_or_init(|| {
            LanguageDetector::load(
                &self.config.detector_model_path(),
                self.config.models.detector_threshold,
            )
        })
    }

    /// Embedding capability, initializing on first use
    pub fn embedder(&self) -> Option<Arc<EmbeddingService>> {
        self.embedder
            .get_or_init(|| EmbeddingService::load(&self.config.embedding_model_path()))
    }
}

/// The enrichment pipeline
pub struct Pipeline {
    store: Arc<Store>,
    services: Arc<Services>,
    notifier: Arc<UpdateNotifier>,
}

impl Pipeline {
    /// Wire the pipeline to its store, services, and update notifier
    pub fn new(store: Arc<Store>, services: Arc<Services>, notifier: Arc<UpdateNotifier>) -> Self {
        Self {
            store,
            services,
            notifier,
        }
    }

    /// Drain the event stream until it closes
    pub async fn run(&self, mut events: mpsc::Receiver<ClipboardData>) {
        while let Some(event) = events.recv().await {
            self.process_event(event).await;
        }
        info!("event stream closed, pipeline stopping");
    }

    /// Handle one captured event. Returns the new item id, or `None` when
    /// the event was dropped (empty or duplicate) or the insert failed.
    pub async fn process_event(&self, event: ClipboardData) -> Option<i64> {
        if event.data.is_empty() {
            debug!("empty clipboard event, ignoring");
            return None;
        }

        match self.store.content_exists(&event.data).await {
            Ok(true) => {
                debug!("duplicate content ignored");
                return None;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("duplicate check failed: {}", e);
                return None;
            }
        }

        let timestamp = if event.timestamp > 0 {
            event.timestamp * 1000
        } else {
            chrono::Utc::now().timestamp_millis()
        };

        let is_image = event.content_type == ContentKind::Image;
        let mut item = ClipboardItem {
            content: event.data,
            timestamp,
            source_app: event.source_app,
            ..Default::default()
        };

        if is_image {
            item.kind = ItemKind::Image;
            item.mime_type = "image/png".to_string();
        } else {
            // Everything non-image enters as text; Code is only ever
            // assigned later by the background language pass
            item.kind = ItemKind::Text;
            item.mime_type = "text/plain".to_string();
            if item.text().map(is_url_like).unwrap_or(false) {
                item.kind = ItemKind::Url;
            }
        }

        let id = match self.store.insert(&item).await {
            Ok(id) => id,
            Err(e) => {
                warn!("failed to save item: {}", e);
                return None;
            }
        };
        info!("item saved: {} ({})", id, item.kind.as_label());
        self.notifier.notify();

        if item.kind == ItemKind::Text {
            self.spawn_language_pass(id, item.text().unwrap_or_default().to_string());
        }
        self.spawn_embedding_pass(id);
        if item.kind == ItemKind::Image {
            self.spawn_ocr_pass(id);
        }

        Some(id)
    }

    /// Background language detection for text items. The JSON heuristic
    /// applies even when the ML detector is unavailable.
    fn spawn_language_pass(&self, id: i64, text: String) {
        let store = Arc::clone(&self.store);
        let services = Arc::clone(&self.services);
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            let detector = services.detector();
            let language = tokio::task::spawn_blocking(move || {
                detect_code_language(&text, detector.as_deref())
            })
            .await
            .unwrap_or_default();

            if language.is_empty() {
                return;
            }

            let Ok(Some(mut item)) = store.get(id).await else {
                return;
            };
            item.kind = ItemKind::Code;
            item.code_language = language.clone();

            match store.update(&item).await {
                Ok(()) => {
                    info!("language detected for item {}: {}", id, language);
                    notifier.notify();
                }
                Err(e) => warn!("language write-back failed for item {}: {}", id, e),
            }
        });
    }

    /// Background embedding generation for every item
    fn spawn_embedding_pass(&self, id: i64) {
        let store = Arc::clone(&self.store);
        let services = Arc::clone(&self.services);
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            let Some(embedder) = services.embedder() else {
                return;
            };

            let Ok(Some(item)) = store.get(id).await else {
                return;
            };
            let text = embedding_text(&item);
            if text.is_empty() {
                return;
            }

            let embedding = tokio::task::spawn_blocking(move || embedder.embed(&text))
                .await
                .unwrap_or_default();
            if embedding.is_empty() {
                return;
            }

            // Reload so concurrent OCR/language results are not clobbered
            let Ok(Some(mut fresh)) = store.get(id).await else {
                return;
            };
            fresh.embedding = embedding;

            match store.update(&fresh).await {
                Ok(()) => {
                    debug!("embedding stored for item {}", id);
                    notifier.notify();
                }
                Err(e) => warn!("embedding write-back failed for item {}: {}", id, e),
            }
        });
    }

    /// Background OCR for images, followed by language detection over the
    /// recognized text and an embedding refresh. The item stays an image;
    /// a detected language only fills `code_language`.
    fn spawn_ocr_pass(&self, id: i64) {
        let store = Arc::clone(&self.store);
        let services = Arc::clone(&self.services);
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            let Some(ocr) = services.ocr() else {
                return;
            };

            let Ok(Some(item)) = store.get(id).await else {
                return;
            };
            let image = item.content.clone();

            let text = tokio::task::spawn_blocking(move || ocr.extract_text(&image))
                .await
                .unwrap_or_default();
            if text.is_empty() {
                return;
            }

            let detector = services.detector();
            let ocr_text = text.clone();
            let language = tokio::task::spawn_blocking(move || {
                detect_code_language(&ocr_text, detector.as_deref())
            })
            .await
            .unwrap_or_default();

            let Ok(Some(mut fresh)) = store.get(id).await else {
                return;
            };
            fresh.ocr_text = text;
            if !language.is_empty() {
                fresh.code_language = language;
            }

            if let Some(embedder) = services.embedder() {
                let text = embedding_text(&fresh);
                let embedding =
                    tokio::task::spawn_blocking(move || embedder.embed(&text))
                        .await
                        .unwrap_or_default();
                if !embedding.is_empty() {
                    fresh.embedding = embedding;
                }
            }

            match store.update(&fresh).await {
                Ok(()) => {
                    info!("OCR completed for item {}", id);
                    notifier.notify();
                }
                Err(e) => warn!("OCR write-back failed for item {}: {}", id, e),
            }
        });
    }
}

/// The text handed to the embedder: content text (empty for images), OCR
/// text, and the language/type hints, newline-separated.
///
/// Empty segments are dropped rather than joined as blank lines, so an
/// image without OCR text embeds as just its type hint. Deliberate: these
/// vectors are only ever compared against vectors produced by this same
/// function, never against an external dump built from the literal
/// all-segments concatenation.
pub fn embedding_text(item: &ClipboardItem) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(text) = item.text() {
        if !text.is_empty() {
            parts.push(text.to_string());
        }
    }
    if !item.ocr_text.is_empty() {
        parts.push(item.ocr_text.clone());
    }
    if !item.code_language.is_empty() {
        parts.push(format!("language: {}", item.code_language));
    }
    parts.push(format!("type: {}", item.kind.as_label()));

    parts.join("\n")
}
