// tests/ingestion_pipeline.rs
//! Drives the full ingestion pass against an in-memory workspace, store,
//! and sink. No network, no filesystem.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use notion_source::{
    AppError, ContentCache, ContentTreeLoader, Document, DocumentSink, Fetcher, GeneratedSlug,
    IngestionDriver, MemoryStore, NotionErrorCode, RemoteSource, RenderMode, SlugPolicy,
};

fn text_run(content: &str) -> Value {
    json!({
        "type": "text",
        "text": { "content": content, "link": null },
        "plain_text": content,
        "annotations": {
            "bold": false, "italic": false, "strikethrough": false,
            "underline": false, "code": false, "color": "default"
        }
    })
}

fn paragraph(id: &str, content: &str) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "paragraph",
        "has_children": false,
        "last_edited_time": "2024-03-01T10:00:00.000Z",
        "paragraph": { "rich_text": [text_run(content)] }
    })
}

fn listing(results: Vec<Value>) -> Value {
    json!({
        "object": "list",
        "results": results,
        "next_cursor": null,
        "has_more": false
    })
}

/// A page with a title and an optional rich_text "Slug" property.
fn page(id: &str, title: &str, slug: Option<&str>) -> Value {
    let mut properties = json!({
        "Name": { "id": "title", "type": "title", "title": [text_run(title)] }
    });
    if let Some(slug) = slug {
        let runs: Vec<Value> = if slug.is_empty() {
            vec![]
        } else {
            vec![text_run(slug)]
        };
        properties["Slug"] = json!({ "id": "slug", "type": "rich_text", "rich_text": runs });
    }
    json!({
        "object": "page",
        "id": id,
        "created_time": "2024-02-01T09:00:00.000Z",
        "last_edited_time": "2024-03-01T10:00:00.000Z",
        "archived": false,
        "url": format!("https://www.notion.so/{}", id),
        "properties": properties
    })
}

#[derive(Default)]
struct FakeWorkspace {
    pages: Vec<Value>,
    children: HashMap<String, Vec<Value>>,
    fail_updates: bool,
    query_calls: AtomicUsize,
    updates: Mutex<Vec<(String, String, Value)>>,
}

impl FakeWorkspace {
    fn with_pages(pages: Vec<Value>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    fn child(mut self, parent: &str, block: Value) -> Self {
        self.children.entry(parent.to_string()).or_default().push(block);
        self
    }
}

#[async_trait]
impl RemoteSource for FakeWorkspace {
    async fn list_children(&self, id: &str, _cursor: Option<&str>) -> Result<Value, AppError> {
        Ok(listing(self.children.get(id).cloned().unwrap_or_default()))
    }

    async fn query_database(
        &self,
        _database_id: &str,
        _filter: Option<&Value>,
        _cursor: Option<&str>,
    ) -> Result<Value, AppError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(listing(self.pages.clone()))
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Value, AppError> {
        self.pages
            .iter()
            .find(|page| page["id"] == page_id)
            .cloned()
            .ok_or_else(|| AppError::NotionService {
                code: NotionErrorCode::ObjectNotFound,
                message: "no such page".to_string(),
                retry_after: None,
            })
    }

    async fn update_property(
        &self,
        page_id: &str,
        key: &str,
        value: &Value,
    ) -> Result<Value, AppError> {
        if self.fail_updates {
            return Err(AppError::NotionService {
                code: NotionErrorCode::Unauthorized,
                message: "integration lacks write access".to_string(),
                retry_after: None,
            });
        }
        self.updates
            .lock()
            .push((page_id.to_string(), key.to_string(), value.clone()));
        Ok(json!({
            "object": "page",
            "id": page_id,
            "properties": { key: value }
        }))
    }
}

#[derive(Default)]
struct RecordingSink {
    documents: Mutex<Vec<Document>>,
    reject_id: Option<String>,
}

#[async_trait]
impl DocumentSink for RecordingSink {
    async fn emit(&self, document: Document) -> Result<(), AppError> {
        if self.reject_id.as_deref() == Some(document.id.as_str()) {
            return Err(AppError::Sink {
                id: document.id,
                message: "disk full".to_string(),
            });
        }
        self.documents.lock().push(document);
        Ok(())
    }
}

struct Harness {
    remote: Arc<FakeWorkspace>,
    store: Arc<MemoryStore>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new(remote: FakeWorkspace) -> Self {
        Self {
            remote: Arc::new(remote),
            store: Arc::new(MemoryStore::new()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    fn driver(&self) -> IngestionDriver {
        let loader = ContentTreeLoader::new(
            self.remote.clone(),
            Fetcher::new(),
            ContentCache::new(self.store.clone(), None),
            None,
        );
        IngestionDriver::new(
            loader,
            self.sink.clone(),
            RenderMode::Markdown,
            false,
            "db-1".to_string(),
            None,
        )
    }

    fn slug_policy() -> SlugPolicy {
        SlugPolicy {
            key: "Slug".to_string(),
            generator: Box::new(|_properties, page| GeneratedSlug {
                notion_key: "Slug".to_string(),
                value: format!("minted-{}", page.id),
                url: None,
            }),
        }
    }
}

#[tokio::test]
async fn documents_arrive_in_query_order() {
    let harness = Harness::new(
        FakeWorkspace::with_pages(vec![
            page("p1", "First", None),
            page("p2", "Second", None),
            page("p3", "Third", None),
        ])
        .child("p1", paragraph("b1", "alpha"))
        .child("p2", paragraph("b2", "beta")),
    );

    harness.driver().run().await.unwrap();

    let documents = harness.sink.documents.lock();
    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    assert_eq!(documents[0].title, "First");
    assert_eq!(documents[0].body, "alpha");
    assert_eq!(documents[1].body, "beta");
    assert_eq!(documents[2].body, "");
}

#[tokio::test]
async fn preamble_flag_prepends_fenced_properties() {
    let harness = Harness::new(
        FakeWorkspace::with_pages(vec![page("p1", "First", None)])
            .child("p1", paragraph("b1", "alpha")),
    );

    harness.driver().with_preamble(true).run().await.unwrap();

    let documents = harness.sink.documents.lock();
    let body = &documents[0].body;
    assert!(body.starts_with("---\n"), "body was: {}", body);
    assert!(body.contains("\"Name\": \"First\""));
    assert!(body.ends_with("---\n\nalpha"), "body was: {}", body);
}

#[tokio::test]
async fn empty_slug_is_minted_written_back_and_patched() {
    let harness = Harness::new(FakeWorkspace::with_pages(vec![page("p1", "First", Some(""))]));

    harness
        .driver()
        .with_slug_policy(Harness::slug_policy())
        .run()
        .await
        .unwrap();

    let documents = harness.sink.documents.lock();
    assert_eq!(documents[0].slug.as_deref(), Some("minted-p1"));
    assert_eq!(
        documents[0].properties.get("Slug").and_then(|v| v.as_str()),
        Some("minted-p1")
    );

    let updates = harness.remote.updates.lock();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "p1");
    assert_eq!(updates[0].1, "Slug");

    // The pre-mutation snapshot must be gone from the cache.
    use notion_source::KeyValueStore;
    assert!(harness.store.get("NOTION_PAGE_p1").is_none());
}

#[tokio::test]
async fn existing_slug_is_used_without_a_write() {
    let harness =
        Harness::new(FakeWorkspace::with_pages(vec![page("p1", "First", Some("kept"))]));

    harness
        .driver()
        .with_slug_policy(Harness::slug_policy())
        .run()
        .await
        .unwrap();

    assert_eq!(
        harness.sink.documents.lock()[0].slug.as_deref(),
        Some("kept")
    );
    assert!(harness.remote.updates.lock().is_empty());
}

#[tokio::test]
async fn missing_slug_property_aborts_the_run() {
    let harness = Harness::new(FakeWorkspace::with_pages(vec![page("p1", "First", None)]));

    let err = harness
        .driver()
        .with_slug_policy(Harness::slug_policy())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Configuration(_)));
    assert!(harness.sink.documents.lock().is_empty());
}

#[tokio::test]
async fn non_string_slug_property_aborts_the_run() {
    let mut bad_page = page("p1", "First", None);
    bad_page["properties"]["Slug"] = json!({ "type": "checkbox", "checkbox": true });
    let harness = Harness::new(FakeWorkspace::with_pages(vec![bad_page]));

    let err = harness
        .driver()
        .with_slug_policy(Harness::slug_policy())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Configuration(_)));
}

#[tokio::test]
async fn failed_slug_write_degrades_to_no_slug() {
    let mut workspace = FakeWorkspace::with_pages(vec![page("p1", "First", Some(""))]);
    workspace.fail_updates = true;
    let harness = Harness::new(workspace);

    harness
        .driver()
        .with_slug_policy(Harness::slug_policy())
        .run()
        .await
        .unwrap();

    assert_eq!(harness.sink.documents.lock()[0].slug, None);
}

#[tokio::test]
async fn sink_rejection_skips_the_page_but_not_the_run() {
    let mut harness = Harness::new(FakeWorkspace::with_pages(vec![
        page("p1", "First", None),
        page("p2", "Second", None),
    ]));
    harness.sink = Arc::new(RecordingSink {
        documents: Mutex::new(Vec::new()),
        reject_id: Some("p1".to_string()),
    });

    harness.driver().run().await.unwrap();

    let documents = harness.sink.documents.lock();
    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["p2"]);
}

#[tokio::test]
async fn key_converter_renames_document_properties() {
    let harness = Harness::new(FakeWorkspace::with_pages(vec![page("p1", "First", None)]));

    harness
        .driver()
        .with_key_converter(Box::new(|name, _property| name.to_lowercase()))
        .run()
        .await
        .unwrap();

    let documents = harness.sink.documents.lock();
    assert!(documents[0].properties.contains_key("name"));
    assert!(!documents[0].properties.contains_key("Name"));
}
