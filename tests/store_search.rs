//! Store contracts exercised through the public API: round-trips,
//! migration stability, and hybrid search lane priority.

use std::sync::Arc;

use clipstash::config::Config;
use clipstash::pipeline::Services;
use clipstash::search::SearchEngine;
use clipstash::store::{ClipboardItem, ItemKind, Store};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Arc<Store> {
    Arc::new(Store::open(&dir.path().join("history.db")).unwrap())
}

fn disabled_services(dir: &TempDir) -> Arc<Services> {
    let mut config = Config::default();
    config.data_dir = dir.path().join("no-models");
    Arc::new(Services::new(config))
}

fn text_item(text: &str, timestamp: i64) -> ClipboardItem {
    ClipboardItem {
        content: text.as_bytes().to_vec(),
        kind: ItemKind::Text,
        timestamp,
        ..Default::default()
    }
}

#[tokio::test]
async fn insert_get_roundtrip_preserves_persisted_fields() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let original = ClipboardItem {
        content: b"SELECT * FROM t;".to_vec(),
        kind: ItemKind::Code,
        source_app: "terminal".to_string(),
        timestamp: 42_000,
        ocr_text: String::new(),
        code_language: "sql".to_string(),
        embedding: vec![0.1, 0.2, 0.3, 0.4],
        metadata: "m".to_string(),
        thumbnail: vec![9, 9],
        ..Default::default()
    };

    let id = store.insert(&original).await.unwrap();
    let loaded = store.get(id).await.unwrap().unwrap();

    assert_eq!(loaded.content, original.content);
    assert_eq!(loaded.kind, original.kind);
    assert_eq!(loaded.source_app, original.source_app);
    assert_eq!(loaded.timestamp, original.timestamp);
    assert_eq!(loaded.ocr_text, original.ocr_text);
    assert_eq!(loaded.code_language, original.code_language);
    assert_eq!(loaded.embedding, original.embedding);
    assert_eq!(loaded.metadata, original.metadata);
    assert_eq!(loaded.thumbnail, original.thumbnail);
    assert_eq!(loaded.is_password, original.is_password);
    assert_eq!(loaded.is_encrypted, original.is_encrypted);
}

#[tokio::test]
async fn reopening_the_store_preserves_schema_and_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.db");

    let store = Store::open(&path).unwrap();
    let id = store.insert(&text_item("persisted", 7)).await.unwrap();
    let columns_before = store.column_names().await.unwrap();
    drop(store);

    let store = Store::open(&path).unwrap();
    let columns_after = store.column_names().await.unwrap();
    assert_eq!(columns_before, columns_after);

    let item = store.get(id).await.unwrap().unwrap();
    assert_eq!(item.text(), Some("persisted"));

    // FTS survives the reopen as well
    let hits = store.search_fts("persisted", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn hybrid_search_prioritizes_exact_over_fts() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    // FTS-only match via Porter stemming; much newer than the exact match
    store
        .insert(&text_item("database connections", 1_000))
        .await
        .unwrap();
    store
        .insert(&text_item("connected devices", 1))
        .await
        .unwrap();

    let services = disabled_services(&dir);
    let engine = SearchEngine::new(Arc::clone(&store), services, 3);

    let results = engine.search("connected", 10).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text(), Some("connected devices"));
    assert_eq!(results[1].text(), Some("database connections"));
}

#[tokio::test]
async fn semantic_ranking_follows_cosine_similarity() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut along_x = text_item("axis x", 1);
    along_x.embedding = vec![1.0, 0.0];
    let id_x = store.insert(&along_x).await.unwrap();

    let mut along_y = text_item("axis y", 2);
    along_y.embedding = vec![0.0, 1.0];
    let id_y = store.insert(&along_y).await.unwrap();

    let hits = store.search_by_embedding(&[0.9, 0.1], 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, id_x);
    assert_eq!(hits[1].id, id_y);
}
