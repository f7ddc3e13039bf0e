//! Document API endpoints.
//!
//! Handlers for submission, status, page image download and OCR results.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::OcrRecord;
use crate::error::ServiceError;
use crate::registry::DocumentStatus;
use crate::service::DocumentStatusReport;

use super::AppState;

/// Response for an accepted submission
#[derive(Serialize)]
pub struct ProcessResponse {
    pub document_id: String,
    pub status: DocumentStatus,
    pub message: String,
}

/// Accept a document for processing
pub async fn process_document_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ProcessResponse>), ServiceError> {
    let mut file_data: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidRequest {
            message: e.to_string(),
        })?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("document").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ServiceError::InvalidRequest {
                message: e.to_string(),
            })?;
        file_data = Some((data.to_vec(), filename));
    }

    let (data, filename) = file_data.ok_or_else(|| ServiceError::InvalidRequest {
        message: "No file provided".to_string(),
    })?;
    if data.is_empty() {
        return Err(ServiceError::InvalidRequest {
            message: "Uploaded file is empty".to_string(),
        });
    }

    let record = state.service.submit_document(&data, &filename).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessResponse {
            document_id: record.id,
            status: record.status,
            message: "Document received and queued for processing".to_string(),
        }),
    ))
}

pub async fn document_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DocumentStatusReport>, ServiceError> {
    Ok(Json(state.service.document_status(&id)?))
}

/// Deliver a materialized page image as an attachment
pub async fn download_image_handler(
    State(state): State<Arc<AppState>>,
    Path((id, image_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    let (file_name, bytes) = state.service.read_image(&id, &image_id).await?;

    let content_type = content_type_for(&file_name);
    let disposition = format!("attachment; filename=\"{}\"", file_name);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

pub async fn ocr_result_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OcrRecord>, ServiceError> {
    Ok(Json(state.service.ocr_result(&id)?))
}

pub async fn list_ocr_results_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OcrRecord>>, ServiceError> {
    Ok(Json(state.service.ocr_results()?))
}

fn content_type_for(file_name: &str) -> mime::Mime {
    let extension = file_name.rsplit('.').next().unwrap_or_default();
    match extension {
        "png" => mime::IMAGE_PNG,
        "jpg" => mime::IMAGE_JPEG,
        "bmp" => mime::IMAGE_BMP,
        other => format!("image/{}", other)
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
    }
}
