//! End-to-end flows through the enrichment pipeline and search engine,
//! with model capabilities disabled (no assets on disk) so the heuristic
//! paths carry the behavior.

use std::sync::Arc;
use std::time::Duration;

use clipstash::config::Config;
use clipstash::monitor::{ClipboardData, ContentKind};
use clipstash::pipeline::{Pipeline, Services, UpdateNotifier};
use clipstash::search::SearchEngine;
use clipstash::store::{ItemKind, Store};
use tempfile::TempDir;

struct Fixture {
    pipeline: Pipeline,
    store: Arc<Store>,
    services: Arc<Services>,
    _db_dir: TempDir,
    _models_dir: TempDir,
}

fn fixture() -> Fixture {
    let db_dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(&db_dir.path().join("history.db")).unwrap());

    let models_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.data_dir = models_dir.path().join("no-models-here");
    let services = Arc::new(Services::new(config));

    let notifier = Arc::new(UpdateNotifier::new(|| {}));
    let pipeline = Pipeline::new(Arc::clone(&store), Arc::clone(&services), notifier);

    Fixture {
        pipeline,
        store,
        services,
        _db_dir: db_dir,
        _models_dir: models_dir,
    }
}

fn text_event(text: &str) -> ClipboardData {
    ClipboardData {
        data: text.as_bytes().to_vec(),
        source_app: "wayland".to_string(),
        window_title: "wayland".to_string(),
        timestamp: 1_700_000_000,
        mime_type: "text/plain".to_string(),
        content_type: ContentKind::Text,
    }
}

fn image_event(bytes: &[u8]) -> ClipboardData {
    ClipboardData {
        data: bytes.to_vec(),
        source_app: "wayland".to_string(),
        window_title: "wayland".to_string(),
        timestamp: 1_700_000_001,
        mime_type: "image/png".to_string(),
        content_type: ContentKind::Image,
    }
}

/// Wait for a background enrichment task to publish its write-back
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..150 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn capturing_the_same_url_twice_keeps_one_item() {
    let f = fixture();

    let first = f
        .pipeline
        .process_event(text_event("https://example.com/path"))
        .await;
    assert!(first.is_some());

    let second = f
        .pipeline
        .process_event(text_event("https://example.com/path"))
        .await;
    assert!(second.is_none());

    let items = f.store.get_recent(10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, ItemKind::Url);
}

#[tokio::test]
async fn json_capture_becomes_code_without_ml() {
    let f = fixture();

    let id = f
        .pipeline
        .process_event(text_event("{\"a\":1}"))
        .await
        .unwrap();

    eventually(|| {
        let store = Arc::clone(&f.store);
        async move {
            let item = store.get(id).await.unwrap().unwrap();
            item.kind == ItemKind::Code && item.code_language == "JSON"
        }
    })
    .await;
}

#[tokio::test]
async fn enriched_screenshot_is_searchable_by_ocr_text() {
    let f = fixture();

    let png_header = [0x89u8, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];
    let id = f
        .pipeline
        .process_event(image_event(&png_header))
        .await
        .unwrap();

    // OCR has no language data in this fixture; apply its write-back the
    // way the background task would
    let mut item = f.store.get(id).await.unwrap().unwrap();
    assert_eq!(item.kind, ItemKind::Image);
    item.ocr_text = "class Foo {}".to_string();
    item.code_language = "csharp".to_string();
    f.store.update(&item).await.unwrap();

    let engine = SearchEngine::new(Arc::clone(&f.store), Arc::clone(&f.services), 3);
    let hits = engine.search("Foo", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);
    assert_eq!(hits[0].kind, ItemKind::Image);
    assert_eq!(hits[0].code_language, "csharp");

    // The OCR text now counts as a duplicate for plain-text captures
    let dropped = f
        .pipeline
        .process_event(text_event("class Foo {}"))
        .await;
    assert!(dropped.is_none());
}

#[tokio::test]
async fn html_events_are_treated_as_text() {
    let f = fixture();

    let mut event = text_event("<b>bold</b>");
    event.content_type = ContentKind::Html;
    event.mime_type = "text/html".to_string();

    let id = f.pipeline.process_event(event).await.unwrap();
    let item = f.store.get(id).await.unwrap().unwrap();
    assert_eq!(item.kind, ItemKind::Text);
}
