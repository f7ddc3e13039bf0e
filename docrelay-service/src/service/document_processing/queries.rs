//! Read-only lookups used by request handlers.

use serde::Serialize;

use crate::db::OcrRecord;
use crate::error::{ServiceError, ServiceResult, StorageError};
use crate::registry::DocumentStatus;
use crate::service::DocumentService;

/// Caller-facing view of a document's progress
#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatusReport {
    pub document_id: String,
    pub status: DocumentStatus,
    pub message: String,
    pub progress: u8,
    pub processed_images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DocumentService {
    pub fn document_status(&self, doc_id: &str) -> ServiceResult<DocumentStatusReport> {
        let record = self
            .registry
            .get(doc_id)
            .ok_or_else(|| ServiceError::DocumentNotFound {
                document_id: doc_id.to_string(),
            })?;

        Ok(DocumentStatusReport {
            document_id: record.id,
            status: record.status,
            message: record.status.message().to_string(),
            progress: record.status.progress(),
            processed_images: record.images.into_iter().map(|i| i.image_id).collect(),
            error_message: record.error_message,
        })
    }

    /// Bytes of a materialized page image, with its local file name
    pub async fn read_image(&self, doc_id: &str, image_id: &str) -> ServiceResult<(String, Vec<u8>)> {
        let record = self
            .registry
            .get(doc_id)
            .ok_or_else(|| ServiceError::DocumentNotFound {
                document_id: doc_id.to_string(),
            })?;

        let not_found = || ServiceError::ImageNotFound {
            image_id: image_id.to_string(),
        };
        let image = record.image(image_id).ok_or_else(not_found)?;
        let path = self.processed_image_path(image).ok_or_else(not_found)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((image.local_file_name(), bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(StorageError::Read {
                path: path.display().to_string(),
                source: e,
            }
            .into()),
        }
    }

    pub fn ocr_results(&self) -> ServiceResult<Vec<OcrRecord>> {
        self.ocr_store.list_ocr_records()
    }

    pub fn ocr_result(&self, doc_id: &str) -> ServiceResult<OcrRecord> {
        self.ocr_store
            .find_by_document_id(doc_id)?
            .ok_or_else(|| ServiceError::OcrResultNotFound {
                document_id: doc_id.to_string(),
            })
    }
}
