//! Clipboard item persistence
//!
//! The store is a single SQLite file with a manually-maintained FTS5 index
//! alongside the row table. This module holds the item model; the database
//! itself lives in [`database`].

pub mod database;

pub use database::{Store, StoreError};

use serde::{Deserialize, Serialize};

/// Kind of a stored clipboard item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// Plain text
    Text,
    /// Text recognized as source code
    Code,
    /// Encoded image bytes
    Image,
    /// A single URL
    Url,
}

impl ItemKind {
    /// Stable text label persisted in the `content_type` column
    pub fn as_label(&self) -> &'static str {
        match self {
            ItemKind::Text => "Text",
            ItemKind::Code => "Code",
            ItemKind::Image => "Image",
            ItemKind::Url => "Url",
        }
    }

    /// Parse a persisted label; unrecognized values fall back to Text
    pub fn from_label(label: &str) -> Self {
        match label {
            "Code" => ItemKind::Code,
            "Image" => ItemKind::Image,
            "Url" => ItemKind::Url,
            _ => ItemKind::Text,
        }
    }
}

impl Default for ItemKind {
    fn default() -> Self {
        ItemKind::Text
    }
}

/// A single clipboard history entry.
///
/// `content` holds UTF-8 bytes for text-like kinds and encoded image bytes
/// (PNG expected) for images. The embedding, OCR text, and code language are
/// filled in asynchronously by the enrichment pipeline after insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipboardItem {
    /// Row id; 0 until inserted
    pub id: i64,
    /// Raw content bytes
    pub content: Vec<u8>,
    /// Item kind; kept in sync with `code_language` on every read
    pub kind: ItemKind,
    /// Original MIME as captured (not persisted; the store keys off `kind`)
    pub mime_type: String,
    /// Best-effort source application
    pub source_app: String,
    /// Capture time in milliseconds since the epoch
    pub timestamp: i64,
    /// Text extracted from images, empty otherwise
    pub ocr_text: String,
    /// Detected programming language; non-empty implies `kind == Code`
    pub code_language: String,
    /// Dense embedding, empty until generated
    pub embedding: Vec<f32>,
    /// Reserved flag, never set by the current pipeline
    pub is_password: bool,
    /// Reserved flag, never set by the current pipeline
    pub is_encrypted: bool,
    /// Reserved free-form metadata
    pub metadata: String,
    /// Reserved image preview bytes
    pub thumbnail: Vec<u8>,
}

impl ClipboardItem {
    /// Content as UTF-8 text. Images yield `None`.
    pub fn text(&self) -> Option<&str> {
        if self.kind == ItemKind::Image {
            return None;
        }
        std::str::from_utf8(&self.content).ok()
    }

    /// The text this item should be findable by: the content for text
    /// kinds, the OCR text for images.
    pub fn searchable_text(&self) -> &str {
        match self.text() {
            Some(text) if !text.is_empty() => text,
            _ => &self.ocr_text,
        }
    }
}

/// Pack an embedding as little-endian f32 bytes for blob storage
pub fn pack_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Unpack a little-endian f32 blob; trailing partial values are ignored
pub fn unpack_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels_roundtrip() {
        for kind in [ItemKind::Text, ItemKind::Code, ItemKind::Image, ItemKind::Url] {
            assert_eq!(ItemKind::from_label(kind.as_label()), kind);
        }
        assert_eq!(ItemKind::from_label("bogus"), ItemKind::Text);
    }

    #[test]
    fn test_embedding_pack_roundtrip() {
        let embedding = vec![0.5f32, -1.25, 3.0, f32::MIN_POSITIVE];
        assert_eq!(unpack_embedding(&pack_embedding(&embedding)), embedding);
        assert!(unpack_embedding(&[]).is_empty());
    }

    #[test]
    fn test_searchable_text_prefers_content() {
        let mut item = ClipboardItem {
            content: b"hello".to_vec(),
            ..Default::default()
        };
        assert_eq!(item.searchable_text(), "hello");

        item.kind = ItemKind::Image;
        item.ocr_text = "from image".to_string();
        assert_eq!(item.searchable_text(), "from image");
    }
}
