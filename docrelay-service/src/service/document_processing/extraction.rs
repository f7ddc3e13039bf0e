//! Text extraction from materialized page images.
//!
//! Images are recognized strictly one at a time on the blocking pool. Each
//! page's text is dropped before the next image is handed to the engine.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::db::{OcrRecord, OcrStatus};
use crate::error::{OcrError, ServiceError, ServiceResult, format_error_chain};
use crate::registry::ImageArtifact;
use crate::service::DocumentService;

/// Append a `=== Page N ===` section for non-blank text.
///
/// Returns false, leaving `buffer` untouched, when the text is whitespace only.
pub(crate) fn append_page_section(buffer: &mut String, page: usize, text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    buffer.push_str(&format!("=== Page {} ===\n", page));
    buffer.push_str(trimmed);
    buffer.push_str("\n\n");
    true
}

impl DocumentService {
    /// Recognize every image in order and persist the result as the
    /// document's OCR record.
    ///
    /// Missing files and per-image engine faults are skipped. Store failures
    /// fail the whole record and are returned as [`OcrError::Batch`].
    pub(crate) async fn extract_text(
        &self,
        doc_id: &str,
        document_name: &str,
        images: &[ImageArtifact],
    ) -> ServiceResult<OcrRecord> {
        let mut record = OcrRecord::processing(doc_id, document_name, images.len());
        if let Err(e) = self.ocr_store.upsert_by_document_id(&record) {
            return Err(self.fail_ocr_record(record, e));
        }

        info!(
            doc_id = %doc_id,
            images = images.len(),
            engine = self.ocr_engine.name(),
            "Starting text extraction"
        );

        let mut text = String::new();
        let mut pages_with_text = 0;

        for (index, image) in images.iter().enumerate() {
            let Some(path) = self.processed_image_path(image) else {
                warn!(doc_id = %doc_id, image_id = %image.image_id, "Unusable image id, skipping");
                continue;
            };
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                warn!(
                    doc_id = %doc_id,
                    image_id = %image.image_id,
                    path = %path.display(),
                    "Image file missing, skipping"
                );
                continue;
            }

            let engine = Arc::clone(&self.ocr_engine);
            let page_text = match tokio::task::spawn_blocking(move || engine.recognize(&path)).await
            {
                Ok(Ok(page_text)) => page_text,
                Ok(Err(e)) => {
                    warn!(
                        doc_id = %doc_id,
                        image_id = %image.image_id,
                        error = %e,
                        "Text recognition failed, skipping image"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        doc_id = %doc_id,
                        image_id = %image.image_id,
                        error = %e,
                        "Text recognition task aborted, skipping image"
                    );
                    continue;
                }
            };

            if append_page_section(&mut text, index + 1, &page_text) {
                pages_with_text += 1;
            } else {
                debug!(doc_id = %doc_id, image_id = %image.image_id, "No text on page");
            }
            drop(page_text);
        }

        record.extracted_text = Some(text);
        record.processing_status = OcrStatus::Completed;
        record.error_message = None;
        record.updated_at = Utc::now();

        match self.ocr_store.upsert_by_document_id(&record) {
            Ok(stored) => {
                info!(
                    doc_id = %doc_id,
                    pages_with_text,
                    characters = stored.extracted_text.as_ref().map_or(0, |t| t.len()),
                    "Text extraction completed"
                );
                Ok(stored)
            }
            Err(e) => Err(self.fail_ocr_record(record, e)),
        }
    }

    /// Mark the OCR record failed and wrap the cause as a batch failure
    fn fail_ocr_record(&self, mut record: OcrRecord, cause: ServiceError) -> ServiceError {
        let message = format_error_chain(&cause);
        error!(doc_id = %record.document_id, error = %message, "Text extraction failed");

        record.processing_status = OcrStatus::Failed;
        record.extracted_text = None;
        record.error_message = Some(message);
        record.updated_at = Utc::now();

        if let Err(e) = self.ocr_store.upsert_by_document_id(&record) {
            error!(
                doc_id = %record.document_id,
                error = %format_error_chain(&e),
                "Failed to record text extraction failure"
            );
        }

        OcrError::Batch {
            document_id: record.document_id,
            source: Box::new(cause),
        }
        .into()
    }
}
