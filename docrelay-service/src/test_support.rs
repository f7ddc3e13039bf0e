//! Test doubles shared by the pipeline tests.
//!
//! `MockProcessor` is a real HTTP server on `127.0.0.1:0` speaking the
//! processor's API, so the reqwest client is exercised end to end.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path as FsPath;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::db::{Database, OcrRecord, OcrRecordStore, OcrStatus};
use crate::error::{DatabaseError, OcrError, ServiceResult};
use crate::ocr::OcrEngine;
use crate::processor::ProcessorReply;
use crate::registry::ImageArtifact;
use crate::service::DocumentService;

/// Build a processor reply with the given status and image ids
pub fn reply(status: &str, image_ids: &[&str]) -> serde_json::Value {
    let images: Vec<_> = image_ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "image_id": id,
                "image_path": format!("/processed/{id}.png"),
                "dpi": 300,
                "format": "PNG",
                "size_kb": 42.0
            })
        })
        .collect();
    serde_json::json!({ "status": status, "processed_images": images, "message": null })
}

/// Image metadata as the processor would list it
pub fn artifacts(image_ids: &[&str]) -> Vec<ImageArtifact> {
    serde_json::from_value::<ProcessorReply>(reply("completed", image_ids))
        .unwrap()
        .artifacts()
}

pub fn failed_reply(message: &str) -> serde_json::Value {
    serde_json::json!({ "status": "failed", "processed_images": [], "message": message })
}

/// What the mock saw on `POST /process`
#[derive(Debug, Clone)]
pub struct Submission {
    pub document_id: String,
    pub filename: String,
    pub content: Vec<u8>,
    pub api_key: Option<String>,
}

#[derive(Default)]
struct MockState {
    submit_reply: Option<serde_json::Value>,
    reject_submit: bool,
    status_replies: Vec<serde_json::Value>,
    images: HashMap<String, Vec<u8>>,
    download_delay: Duration,
    submissions: Mutex<Vec<Submission>>,
    status_calls: AtomicUsize,
}

#[derive(Default)]
pub struct MockProcessorBuilder {
    state: MockState,
}

impl MockProcessorBuilder {
    pub fn submit_reply(mut self, reply: serde_json::Value) -> Self {
        self.state.submit_reply = Some(reply);
        self
    }

    pub fn reject_submit(mut self) -> Self {
        self.state.reject_submit = true;
        self
    }

    /// Replies for successive status calls; the last one repeats
    pub fn status_replies(mut self, replies: Vec<serde_json::Value>) -> Self {
        self.state.status_replies = replies;
        self
    }

    pub fn image(mut self, image_id: &str, content: &[u8]) -> Self {
        self.state
            .images
            .insert(image_id.to_string(), content.to_vec());
        self
    }

    /// Hold every image download for `delay` before answering
    pub fn download_delay(mut self, delay: Duration) -> Self {
        self.state.download_delay = delay;
        self
    }

    pub async fn spawn(self) -> MockProcessor {
        let state = Arc::new(self.state);
        let app = Router::new()
            .route("/process", post(process_handler))
            .route("/status/{document_id}", get(status_handler))
            .route("/download/{document_id}/{image_id}", get(download_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockProcessor {
            base_url: format!("http://{addr}"),
            state,
        }
    }
}

pub struct MockProcessor {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockProcessor {
    pub fn builder() -> MockProcessorBuilder {
        MockProcessorBuilder::default()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.submissions.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.state.status_calls.load(Ordering::SeqCst)
    }
}

async fn process_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut submission = Submission {
        document_id: String::new(),
        filename: String::new(),
        content: Vec::new(),
        api_key: headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                submission.filename = field.file_name().unwrap_or("").to_string();
                submission.content = field.bytes().await.unwrap().to_vec();
            }
            "document_id" => submission.document_id = field.text().await.unwrap(),
            _ => {}
        }
    }
    state.submissions.lock().unwrap().push(submission);

    if state.reject_submit {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let reply = state
        .submit_reply
        .clone()
        .unwrap_or_else(|| reply("processing", &[]));
    Json(reply).into_response()
}

async fn status_handler(
    State(state): State<Arc<MockState>>,
    Path(_document_id): Path<String>,
) -> Json<serde_json::Value> {
    let call = state.status_calls.fetch_add(1, Ordering::SeqCst);
    let reply = state
        .status_replies
        .get(call)
        .or_else(|| state.status_replies.last())
        .cloned()
        .unwrap_or_else(|| reply("processing", &[]));
    Json(reply)
}

async fn download_handler(
    State(state): State<Arc<MockState>>,
    Path((_document_id, image_id)): Path<(String, String)>,
) -> Response {
    tokio::time::sleep(state.download_delay).await;
    match state.images.get(&image_id) {
        Some(content) => Bytes::from(content.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// OCR engine that "recognizes" the UTF-8 contents of the image file.
/// A file containing exactly `ENGINE-FAULT` makes the engine fail.
#[derive(Default)]
pub struct FakeOcrEngine {
    calls: Mutex<Vec<String>>,
}

impl FakeOcrEngine {
    /// File names in the order the engine saw them
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl OcrEngine for FakeOcrEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn recognize(&self, image_path: &FsPath) -> Result<String, OcrError> {
        let name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(name);

        let text = std::fs::read_to_string(image_path).map_err(|e| OcrError::Engine {
            path: image_path.display().to_string(),
            message: e.to_string(),
        })?;
        if text == "ENGINE-FAULT" {
            return Err(OcrError::Engine {
                path: image_path.display().to_string(),
                message: "simulated engine fault".to_string(),
            });
        }
        Ok(text)
    }
}

/// OCR store that rejects upserts of records in one status
pub struct FlakyStore {
    inner: Database,
    failing_status: OcrStatus,
}

impl FlakyStore {
    pub fn failing_on(failing_status: OcrStatus) -> Self {
        Self {
            inner: Database::open_in_memory().unwrap(),
            failing_status,
        }
    }
}

impl OcrRecordStore for FlakyStore {
    fn upsert_by_document_id(&self, record: &OcrRecord) -> ServiceResult<OcrRecord> {
        if record.processing_status == self.failing_status {
            return Err(DatabaseError::Query(rusqlite::Error::QueryReturnedNoRows).into());
        }
        self.inner.upsert_by_document_id(record)
    }

    fn find_by_document_id(&self, document_id: &str) -> ServiceResult<Option<OcrRecord>> {
        self.inner.find_by_document_id(document_id)
    }

    fn list_ocr_records(&self) -> ServiceResult<Vec<OcrRecord>> {
        self.inner.list_ocr_records()
    }
}

/// A `DocumentService` wired to temp directories, a fake OCR engine and an
/// in-memory database.
pub struct TestHarness {
    pub service: Arc<DocumentService>,
    pub engine: Arc<FakeOcrEngine>,
    pub dir: TempDir,
}

impl TestHarness {
    pub fn new(processor_url: &str) -> Self {
        Self::with_config(processor_url, |_| {})
    }

    pub fn with_config(processor_url: &str, configure: impl FnOnce(&mut ServiceConfig)) -> Self {
        let store: Arc<dyn OcrRecordStore> = Arc::new(Database::open_in_memory().unwrap());
        Self::with_store(processor_url, store, configure)
    }

    pub fn with_store(
        processor_url: &str,
        store: Arc<dyn OcrRecordStore>,
        configure: impl FnOnce(&mut ServiceConfig),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let mut config = ServiceConfig::default();
        config.storage.upload_dir = dir.path().join("uploads");
        config.storage.processed_dir = dir.path().join("processed");
        config.storage.data_dir = dir.path().join("data");
        config.processor.base_url = processor_url.to_string();
        config.processor.api_key = "test-key".to_string();
        config.processor.connect_timeout_secs = 2;
        config.processor.read_timeout_secs = 5;
        config.processor.max_poll_attempts = 5;
        config.processor.poll_interval_ms = 20;
        config.cleanup.enabled = false;
        configure(&mut config);

        let engine = Arc::new(FakeOcrEngine::default());
        let service =
            DocumentService::new(Arc::new(config), engine.clone(), store).unwrap();

        Self {
            service: Arc::new(service),
            engine,
            dir,
        }
    }
}

/// Poll `check` until it returns `Some`, panicking after `timeout`
pub async fn wait_for<T, F, Fut>(timeout: Duration, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return value;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
