use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::registry::DocumentStatus;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Document not found: {document_id}")]
    DocumentNotFound { document_id: String },

    #[error("Image not found: {image_id}")]
    ImageNotFound { image_id: String },

    #[error("OCR result not found for document: {document_id}")]
    OcrResultNotFound { document_id: String },

    #[error("{0}")]
    Processor(#[from] ProcessorError),

    #[error("{0}")]
    Ocr(#[from] OcrError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Storage error")]
    Storage(#[from] StorageError),

    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Failures talking to the external page-image processor
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Failed to send file for processing to {url}")]
    Dispatch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Processor rejected request to {url} (status {status})")]
    Rejected { url: String, status: u16 },

    #[error("Invalid response from processor")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },

    /// The processor itself reported failure; the message is passed through verbatim.
    #[error("{message}")]
    RemoteFailure { message: String },

    #[error("Processing timeout for document {document_id} after {attempts} attempts")]
    PollTimeout { document_id: String, attempts: u32 },

    #[error("Failed to download image {image_id}")]
    ImageDownload {
        image_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// OCR errors
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR engine failed on {path}: {message}")]
    Engine { path: String, message: String },

    #[error("OCR batch failed for document {document_id}")]
    Batch {
        document_id: String,
        #[source]
        source: Box<ServiceError>,
    },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Invalid timestamp in column {column}: {value}")]
    Timestamp { column: &'static str, value: String },
}

/// Local filesystem errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Registry update errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Document not tracked: {document_id}")]
    NotFound { document_id: String },

    #[error("Invalid status transition for {document_id}: {from} -> {to}")]
    InvalidTransition {
        document_id: String,
        from: DocumentStatus,
        to: DocumentStatus,
    },
}

/// API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DocumentNotFound { .. }
            | ServiceError::ImageNotFound { .. }
            | ServiceError::OcrResultNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::Processor(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::DocumentNotFound { .. } => "document_not_found",
            ServiceError::ImageNotFound { .. } => "image_not_found",
            ServiceError::OcrResultNotFound { .. } => "ocr_result_not_found",
            ServiceError::Processor(ProcessorError::Dispatch { .. })
            | ServiceError::Processor(ProcessorError::Rejected { .. }) => "upload_dispatch_error",
            ServiceError::Processor(ProcessorError::InvalidResponse { .. }) => {
                "processor_invalid_response"
            }
            ServiceError::Processor(ProcessorError::RemoteFailure { .. }) => {
                "remote_processing_failure"
            }
            ServiceError::Processor(ProcessorError::PollTimeout { .. }) => "poll_timeout",
            ServiceError::Processor(ProcessorError::ImageDownload { .. }) => {
                "image_download_failure"
            }
            ServiceError::Ocr(OcrError::Engine { .. }) => "ocr_engine_failure",
            ServiceError::Ocr(OcrError::Batch { .. }) => "ocr_batch_failure",
            ServiceError::Database(_) => "database_error",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::FileTooLarge { .. } => "file_too_large",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %format_error_chain(&self), "Request failed");
        }

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(self.error_code().to_string()),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error and its source chain on one line, outermost first.
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.ends_with(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
