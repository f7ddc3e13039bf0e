//! HTTP API for the document relay service.
//!
//! This module provides the REST API endpoints for:
//! - Health monitoring
//! - Document submission and status
//! - Page image download
//! - OCR results

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::DocumentService;

pub mod documents;
use documents::{
    document_status_handler, download_image_handler, list_ocr_results_handler, ocr_result_handler,
    process_document_handler,
};

/// Multipart framing on top of the document itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<DocumentService>,
    pub start_time: Instant,
}

/// Build the API router
pub fn router(service: Arc<DocumentService>) -> Router {
    let max_body_size = usize::try_from(service.config.limits.max_document_size_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/documents/process",
            post(process_document_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/documents/{id}/status", get(document_status_handler))
        .route(
            "/documents/{id}/download/{image_id}",
            get(download_image_handler),
        )
        .route("/documents/{id}/ocr", get(ocr_result_handler))
        .route("/ocr", get(list_ocr_results_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        tracked_documents: state.service.registry.len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    tracked_documents: usize,
}
