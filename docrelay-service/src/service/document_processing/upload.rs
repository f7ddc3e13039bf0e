//! Document intake.

use std::sync::Arc;

use tracing::info;

use crate::error::{ServiceError, ServiceResult, StorageError};
use crate::registry::DocumentRecord;
use crate::service::DocumentService;

/// Reduce a client-supplied file name to its final path component
pub(crate) fn sanitize_filename(filename: &str) -> ServiceResult<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(ServiceError::InvalidRequest {
            message: format!("Invalid file name: {:?}", filename),
        });
    }
    Ok(name.to_string())
}

impl DocumentService {
    /// Store a submitted document and start its pipeline.
    ///
    /// The original is written to the upload directory before the registry
    /// entry exists. The returned record is the `Pending` snapshot; callers
    /// follow progress through [`DocumentService::document_status`].
    pub async fn submit_document(
        self: &Arc<Self>,
        content: &[u8],
        filename: &str,
    ) -> ServiceResult<DocumentRecord> {
        let max_size = self.config.limits.max_document_size_bytes;
        if content.len() as u64 > max_size {
            return Err(ServiceError::FileTooLarge {
                size: content.len() as u64,
                max: max_size,
            });
        }

        let filename = sanitize_filename(filename)?;
        let doc_id = uuid::Uuid::new_v4().to_string();

        let path = self
            .config
            .storage
            .upload_dir
            .join(format!("{}_{}", doc_id, filename));
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| StorageError::Write {
                path: path.display().to_string(),
                source: e,
            })?;

        let record = self.registry.create(&doc_id, &filename, path);
        info!(
            doc_id = %doc_id,
            filename = %filename,
            bytes = content.len(),
            "Document accepted for processing"
        );

        self.spawn_pipeline(record.clone());
        Ok(record)
    }
}
