//! SQLite-backed clipboard store
//!
//! One database file holds the row table, a manually-maintained FTS5 index,
//! and a key/value config table. FTS rows are written by this module on
//! every insert and update; there are no triggers.

use super::{pack_embedding, unpack_embedding, ClipboardItem, ItemKind};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Semantic search scans at most this many of the newest embedded rows
const SEMANTIC_SCAN_LIMIT: usize = 100;

/// Columns shared by every item SELECT, in fixed order
const ITEM_COLUMNS: &str = "id, content, content_type, ocr_text, embedding, source_app, \
     timestamp, is_password, is_encrypted, metadata, thumbnail, code_language";

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open or migrate the database
    #[error("Failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Database operation error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// SQLite store shared by every thread of the front-end. WAL keeps readers
/// unblocked while one writer commits.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store and bring the schema up to date.
    /// Migration is idempotent; opening an already-current file is a no-op.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;

        create_tables(&conn)?;
        migrate_schema(&conn)?;
        create_indexes(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new item and its FTS row, returning the assigned id
    pub async fn insert(&self, item: &ClipboardItem) -> Result<i64, StoreError> {
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT INTO clipboard_items
             (content, content_type, ocr_text, embedding, source_app, timestamp,
              is_password, is_encrypted, metadata, thumbnail, code_language)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                item.content,
                persisted_label(item),
                item.ocr_text,
                blob_or_null(&pack_embedding(&item.embedding)),
                item.source_app,
                item.timestamp,
                item.is_password,
                item.is_encrypted,
                text_or_null(&item.metadata),
                blob_or_null(&item.thumbnail),
                item.code_language,
            ],
        )?;

        let id = conn.last_insert_rowid();
        sync_fts(&conn, id, item);

        Ok(id)
    }

    /// Fetch one item by id. The kind is reconstructed from the persisted
    /// label, forced to Code whenever a code language is present.
    pub async fn get(&self, id: i64) -> Result<Option<ClipboardItem>, StoreError> {
        let conn = self.conn.lock().await;

        let item = conn
            .query_row(
                &format!("SELECT {} FROM clipboard_items WHERE id = ?", ITEM_COLUMNS),
                params![id],
                row_to_item,
            )
            .optional()?;

        Ok(item)
    }

    /// Most recent items, newest first
    pub async fn get_recent(&self, limit: usize) -> Result<Vec<ClipboardItem>, StoreError> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM clipboard_items ORDER BY timestamp DESC LIMIT ?",
            ITEM_COLUMNS
        ))?;

        let items = stmt
            .query_map(params![limit as i64], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Rewrite every mutable field of an existing item and refresh its FTS row
    pub async fn update(&self, item: &ClipboardItem) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;

        conn.execute(
            "UPDATE clipboard_items
             SET content = ?, content_type = ?, ocr_text = ?, embedding = ?,
                 source_app = ?, timestamp = ?, is_password = ?, is_encrypted = ?,
                 metadata = ?, thumbnail = ?, code_language = ?
             WHERE id = ?",
            params![
                item.content,
                persisted_label(item),
                item.ocr_text,
                blob_or_null(&pack_embedding(&item.embedding)),
                item.source_app,
                item.timestamp,
                item.is_password,
                item.is_encrypted,
                text_or_null(&item.metadata),
                blob_or_null(&item.thumbnail),
                item.code_language,
                item.id,
            ],
        )?;

        sync_fts(&conn, item.id, item);
        Ok(())
    }

    /// Delete one item. Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute("DELETE FROM clipboard_items WHERE id = ?", params![id])?;
        conn.execute("DELETE FROM clipboard_fts WHERE rowid = ?", params![id])?;
        Ok(changed > 0)
    }

    /// Remove every item and the whole FTS index
    pub async fn delete_all(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM clipboard_items", [])?;
        conn.execute("DELETE FROM clipboard_fts", [])?;
        Ok(())
    }

    /// Case-insensitive substring search across content (non-image), OCR
    /// text, code language, source app, and the type label.
    pub async fn search_exact(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ClipboardItem>, StoreError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM clipboard_items
             WHERE (
                 (content_type != 'Image' AND CAST(content AS TEXT) LIKE '%' || ?1 || '%' COLLATE NOCASE)
                 OR (ocr_text LIKE '%' || ?1 || '%' COLLATE NOCASE)
                 OR (code_language LIKE '%' || ?1 || '%' COLLATE NOCASE)
                 OR (source_app LIKE '%' || ?1 || '%' COLLATE NOCASE)
                 OR (content_type LIKE '%' || ?1 || '%' COLLATE NOCASE)
             )
             ORDER BY timestamp DESC
             LIMIT ?2",
            ITEM_COLUMNS
        ))?;

        let items = stmt
            .query_map(params![query, limit as i64], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Full-text search with FTS5 `MATCH`. Ordering beyond the engine
    /// default is not guaranteed; callers re-rank.
    pub async fn search_fts(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ClipboardItem>, StoreError> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM clipboard_items c
             INNER JOIN clipboard_fts f ON c.id = f.rowid
             WHERE f MATCH ?
             LIMIT ?",
            item_columns_qualified("c")
        ))?;

        let items = stmt
            .query_map(params![query, limit as i64], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Cosine-similarity scan over stored embeddings.
    ///
    /// Only the newest `SEMANTIC_SCAN_LIMIT` rows with a non-null embedding
    /// are considered; rows whose dimension differs from the query vector
    /// are skipped.
    pub async fn search_by_embedding(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ClipboardItem>, StoreError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM clipboard_items
             WHERE embedding IS NOT NULL
             ORDER BY timestamp DESC
             LIMIT ?",
            ITEM_COLUMNS
        ))?;

        let candidates = stmt
            .query_map(params![SEMANTIC_SCAN_LIMIT as i64], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut scored: Vec<(f32, ClipboardItem)> = candidates
            .into_iter()
            .filter(|item| item.embedding.len() == query.len())
            .map(|item| (cosine_similarity(query, &item.embedding), item))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, item)| item)
            .collect())
    }

    /// Duplicate check: exact content match, plus the OCR rule — a text
    /// payload whose trimmed form equals the trimmed OCR text of any stored
    /// image counts as a duplicate.
    pub async fn content_exists(&self, content: &[u8]) -> Result<bool, StoreError> {
        if content.is_empty() {
            return Ok(false);
        }

        let conn = self.conn.lock().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM clipboard_items WHERE content = ?",
            params![content],
            |row| row.get(0),
        )?;
        if count > 0 {
            debug!("duplicate: exact content match");
            return Ok(true);
        }

        let Ok(text) = std::str::from_utf8(content) else {
            return Ok(false);
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(false);
        }

        let mut stmt = conn.prepare(
            "SELECT ocr_text FROM clipboard_items
             WHERE content_type = 'Image' AND ocr_text IS NOT NULL AND ocr_text != ''",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let ocr: String = row.get(0)?;
            if ocr.trim() == trimmed {
                debug!("duplicate: matches OCR text of an existing image");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Column names of `clipboard_items`, used by migration checks
    pub async fn column_names(&self) -> Result<HashSet<String>, StoreError> {
        let conn = self.conn.lock().await;
        Ok(table_columns(&conn)?)
    }
}

fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    // The FTS index is updated manually on every write; no triggers.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS clipboard_items (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             content BLOB NOT NULL,
             content_type TEXT NOT NULL,
             ocr_text TEXT,
             embedding BLOB,
             source_app TEXT,
             timestamp INTEGER NOT NULL,
             is_password BOOLEAN NOT NULL DEFAULT 0,
             is_encrypted BOOLEAN NOT NULL DEFAULT 0,
             metadata TEXT,
             thumbnail BLOB,
             code_language TEXT
         );

         CREATE VIRTUAL TABLE IF NOT EXISTS clipboard_fts USING fts5(
             content, ocr_text, code_language, source_app, tokenize='porter unicode61'
         );

         CREATE TABLE IF NOT EXISTS config (
             key TEXT PRIMARY KEY,
             value TEXT NOT NULL
         );",
    )
}

fn create_indexes(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_timestamp ON clipboard_items(timestamp DESC);
         CREATE INDEX IF NOT EXISTS idx_content_type ON clipboard_items(content_type);
         CREATE INDEX IF NOT EXISTS idx_password ON clipboard_items(is_password);
         CREATE INDEX IF NOT EXISTS idx_source_app ON clipboard_items(source_app);",
    )
}

fn table_columns(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("PRAGMA table_info(clipboard_items)")?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(cols)
}

/// Add any column an older schema is missing. Legacy files that carried a
/// `mime_type` column get its values copied into the new `content_type`.
fn migrate_schema(conn: &Connection) -> rusqlite::Result<()> {
    let cols = table_columns(conn)?;

    if !cols.contains("content_type") {
        conn.execute("ALTER TABLE clipboard_items ADD COLUMN content_type TEXT", [])?;
        if cols.contains("mime_type") {
            conn.execute(
                "UPDATE clipboard_items SET content_type = mime_type
                 WHERE content_type IS NULL OR content_type = ''",
                [],
            )?;
        }
    }

    for (column, definition) in [
        ("ocr_text", "TEXT"),
        ("embedding", "BLOB"),
        ("source_app", "TEXT"),
        ("is_password", "INTEGER DEFAULT 0"),
        ("is_encrypted", "INTEGER DEFAULT 0"),
        ("metadata", "TEXT"),
        ("thumbnail", "BLOB"),
        ("code_language", "TEXT"),
    ] {
        if !cols.contains(column) {
            conn.execute(
                &format!("ALTER TABLE clipboard_items ADD COLUMN {} {}", column, definition),
                [],
            )?;
        }
    }

    Ok(())
}

/// Upsert the FTS row for an item. Images index the empty string as
/// content, so they are findable only through their OCR text. A sync
/// failure leaves the row unsearchable but intact.
fn sync_fts(conn: &Connection, id: i64, item: &ClipboardItem) {
    let content_text = if item.kind == ItemKind::Image {
        ""
    } else {
        item.text().unwrap_or("")
    };

    let result = conn.execute(
        "INSERT OR REPLACE INTO clipboard_fts(rowid, content, ocr_text, code_language, source_app)
         VALUES (?, ?, ?, ?, ?)",
        params![
            id,
            content_text,
            item.ocr_text,
            item.code_language,
            item.source_app
        ],
    );

    if let Err(e) = result {
        warn!("FTS sync failed for item {}: {}", id, e);
    }
}

/// The label written to `content_type`. The in-memory kind is stored
/// as-is: an image that later gains a code language keeps its Image label,
/// and reads force the Code kind from `code_language` instead.
fn persisted_label(item: &ClipboardItem) -> &'static str {
    item.kind.as_label()
}

fn blob_or_null(bytes: &[u8]) -> Option<&[u8]> {
    (!bytes.is_empty()).then_some(bytes)
}

fn text_or_null(text: &str) -> Option<&str> {
    (!text.is_empty()).then_some(text)
}

fn item_columns_qualified(alias: &str) -> String {
    ITEM_COLUMNS
        .split(", ")
        .map(|col| format!("{}.{}", alias, col))
        .collect::<Vec<_>>()
        .join(", ")
}

fn row_to_item(row: &Row) -> rusqlite::Result<ClipboardItem> {
    let label: String = row.get(2)?;
    let ocr_text: Option<String> = row.get(3)?;
    let embedding: Option<Vec<u8>> = row.get(4)?;
    let source_app: Option<String> = row.get(5)?;
    let metadata: Option<String> = row.get(9)?;
    let thumbnail: Option<Vec<u8>> = row.get(10)?;
    let code_language: Option<String> = row.get(11)?;

    let code_language = code_language.unwrap_or_default();
    let mut kind = ItemKind::from_label(&label);
    // A detected language forces the Code kind, except for images: an
    // image whose OCR text turned out to be code stays an image
    if !code_language.is_empty() && kind != ItemKind::Image {
        kind = ItemKind::Code;
    }

    Ok(ClipboardItem {
        id: row.get(0)?,
        content: row.get(1)?,
        kind,
        mime_type: String::new(),
        source_app: source_app.unwrap_or_default(),
        timestamp: row.get(6)?,
        ocr_text: ocr_text.unwrap_or_default(),
        code_language,
        embedding: embedding.as_deref().map(unpack_embedding).unwrap_or_default(),
        is_password: row.get(7)?,
        is_encrypted: row.get(8)?,
        metadata: metadata.unwrap_or_default(),
        thumbnail: thumbnail.unwrap_or_default(),
    })
}

/// Cosine similarity of two equal-length vectors; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    fn text_item(text: &str, timestamp: i64) -> ClipboardItem {
        ClipboardItem {
            content: text.as_bytes().to_vec(),
            kind: ItemKind::Text,
            mime_type: "text/plain".to_string(),
            timestamp,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_get_roundtrip() {
        let (store, _dir) = test_store();

        let item = ClipboardItem {
            content: b"fn main() {}".to_vec(),
            kind: ItemKind::Code,
            source_app: "editor".to_string(),
            timestamp: 1000,
            ocr_text: String::new(),
            code_language: "rust".to_string(),
            embedding: vec![0.25, -0.5, 1.0],
            metadata: "note".to_string(),
            thumbnail: vec![1, 2, 3],
            ..Default::default()
        };

        let id = store.insert(&item).await.unwrap();
        assert!(id >= 1);

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.content, item.content);
        assert_eq!(loaded.kind, ItemKind::Code);
        assert_eq!(loaded.source_app, "editor");
        assert_eq!(loaded.timestamp, 1000);
        assert_eq!(loaded.code_language, "rust");
        assert_eq!(loaded.embedding, item.embedding);
        assert_eq!(loaded.metadata, "note");
        assert_eq!(loaded.thumbnail, vec![1, 2, 3]);
        assert!(!loaded.is_password);
        assert!(!loaded.is_encrypted);
    }

    #[tokio::test]
    async fn test_code_language_forces_code_kind() {
        let (store, _dir) = test_store();

        // Inconsistent input: Text kind but a language present
        let mut item = text_item("SELECT 1;", 1);
        item.code_language = "sql".to_string();
        let id = store.insert(&item).await.unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.kind, ItemKind::Code);

        // And the inverse holds for plain items
        let id2 = store.insert(&text_item("plain", 2)).await.unwrap();
        let loaded2 = store.get(id2).await.unwrap().unwrap();
        assert_eq!(loaded2.kind, ItemKind::Text);
        assert!(loaded2.code_language.is_empty());
    }

    #[tokio::test]
    async fn test_fts_row_written_on_insert_and_update() {
        let (store, _dir) = test_store();

        let mut item = text_item("the quick brown fox", 1);
        item.source_app = "browser".to_string();
        let id = store.insert(&item).await.unwrap();

        let hits = store.search_fts("quick", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);

        let by_app = store.search_fts("browser", 10).await.unwrap();
        assert_eq!(by_app.len(), 1);

        // Update refreshes the index
        let mut updated = store.get(id).await.unwrap().unwrap();
        updated.ocr_text = "zebra".to_string();
        store.update(&updated).await.unwrap();

        let by_ocr = store.search_fts("zebra", 10).await.unwrap();
        assert_eq!(by_ocr.len(), 1);
        assert_eq!(by_ocr[0].id, id);
    }

    #[tokio::test]
    async fn test_images_only_match_via_ocr_text() {
        let (store, _dir) = test_store();

        let mut image = ClipboardItem {
            content: b"not-really-png-but-binary".to_vec(),
            kind: ItemKind::Image,
            timestamp: 5,
            ..Default::default()
        };
        let id = store.insert(&image).await.unwrap();

        // Raw bytes must not be indexed as content
        assert!(store.search_fts("binary", 10).await.unwrap().is_empty());

        image.id = id;
        image.ocr_text = "class Foo {}".to_string();
        store.update(&image).await.unwrap();

        let hits = store.search_fts("Foo", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }

    #[tokio::test]
    async fn test_image_with_code_language_stays_image() {
        let (store, _dir) = test_store();

        let mut image = ClipboardItem {
            content: vec![0x89, 0x50, 0x4e, 0x47],
            kind: ItemKind::Image,
            timestamp: 1,
            ..Default::default()
        };
        let id = store.insert(&image).await.unwrap();

        // OCR found code in the screenshot
        image.id = id;
        image.ocr_text = "class Foo {}".to_string();
        image.code_language = "csharp".to_string();
        store.update(&image).await.unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.kind, ItemKind::Image);
        assert_eq!(loaded.code_language, "csharp");

        // A later read-modify-write cycle must not flip the label
        store.update(&loaded).await.unwrap();
        let reloaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(reloaded.kind, ItemKind::Image);
    }

    #[tokio::test]
    async fn test_content_exists_exact_and_ocr() {
        let (store, _dir) = test_store();

        store.insert(&text_item("hello world", 1)).await.unwrap();
        assert!(store.content_exists(b"hello world").await.unwrap());
        assert!(!store.content_exists(b"something else").await.unwrap());
        assert!(!store.content_exists(b"").await.unwrap());

        // Text equal to an image's trimmed OCR text is a duplicate
        let mut image = ClipboardItem {
            content: vec![0x89, 0x50, 0x4e, 0x47],
            kind: ItemKind::Image,
            timestamp: 2,
            ..Default::default()
        };
        let id = store.insert(&image).await.unwrap();
        image.id = id;
        image.ocr_text = "  copied from screenshot \n".to_string();
        store.update(&image).await.unwrap();

        assert!(store
            .content_exists(b"copied from screenshot")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_get_recent_ordering_and_limit() {
        let (store, _dir) = test_store();

        for i in 0..5 {
            store
                .insert(&text_item(&format!("item {}", i), i))
                .await
                .unwrap();
        }

        let recent = store.get_recent(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].text(), Some("item 4"));
        assert_eq!(recent[2].text(), Some("item 2"));
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let (store, _dir) = test_store();

        let id = store.insert(&text_item("bye", 1)).await.unwrap();
        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(store.get(id).await.unwrap().is_none());
        assert!(store.search_fts("bye", 10).await.unwrap().is_empty());

        store.insert(&text_item("a", 1)).await.unwrap();
        store.insert(&text_item("b", 2)).await.unwrap();
        store.delete_all().await.unwrap();
        assert!(store.get_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_exact_scope_and_order() {
        let (store, _dir) = test_store();

        let mut code = text_item("let x = 1;", 10);
        code.code_language = "rust".to_string();
        store.insert(&code).await.unwrap();

        let mut older = text_item("RUST is great", 5);
        older.source_app = "notes".to_string();
        store.insert(&older).await.unwrap();

        // Case-insensitive, matches code_language too, newest first
        let hits = store.search_exact("rust", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].timestamp, 10);
        assert_eq!(hits[1].timestamp, 5);

        // Image content bytes are excluded from the content column match
        let image = ClipboardItem {
            content: b"rust".to_vec(),
            kind: ItemKind::Image,
            timestamp: 20,
            ..Default::default()
        };
        store.insert(&image).await.unwrap();
        let hits = store.search_exact("rust", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_search_by_embedding_ranks_by_cosine() {
        let (store, _dir) = test_store();

        let mut a = text_item("first", 1);
        a.embedding = vec![1.0, 0.0];
        let id_a = store.insert(&a).await.unwrap();

        let mut b = text_item("second", 2);
        b.embedding = vec![0.0, 1.0];
        store.insert(&b).await.unwrap();

        // Mismatched dimension is skipped
        let mut c = text_item("third", 3);
        c.embedding = vec![1.0, 0.0, 0.0];
        store.insert(&c).await.unwrap();

        let hits = store.search_by_embedding(&[0.9, 0.1], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, id_a);
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migrate.db");

        let store = Store::open(&path).unwrap();
        let first = store.column_names().await.unwrap();
        drop(store);

        let store = Store::open(&path).unwrap();
        let second = store.column_names().await.unwrap();
        assert_eq!(first, second);
        assert!(second.contains("code_language"));
        assert!(second.contains("thumbnail"));
    }

    #[tokio::test]
    async fn test_migration_copies_legacy_mime_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.db");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE clipboard_items (
                     id INTEGER PRIMARY KEY AUTOINCREMENT,
                     content BLOB NOT NULL,
                     mime_type TEXT,
                     timestamp INTEGER NOT NULL
                 );
                 INSERT INTO clipboard_items (content, mime_type, timestamp)
                 VALUES (x'41', 'Text', 123);",
            )
            .unwrap();
        }

        let store = Store::open(&path).unwrap();
        let cols = store.column_names().await.unwrap();
        assert!(cols.contains("content_type"));
        assert!(cols.contains("embedding"));

        let item = store.get(1).await.unwrap().unwrap();
        assert_eq!(item.kind, ItemKind::Text);
        assert_eq!(item.content, b"A");
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
