//! Submission of a stored document to the external processor.

use tracing::{debug, info};

use crate::error::ServiceResult;
use crate::registry::{DocumentRecord, ImageArtifact};
use crate::service::DocumentService;

impl DocumentService {
    /// Send the original file to the processor.
    ///
    /// Returns the image list when the processor finished inline, `None` when
    /// the document has to be polled. Transport failures and rejected
    /// submissions are returned as errors and are not retried.
    pub(crate) async fn dispatch_document(
        &self,
        record: &DocumentRecord,
    ) -> ServiceResult<Option<Vec<ImageArtifact>>> {
        let doc_id = record.id.as_str();
        debug!(doc_id = %doc_id, filename = %record.original_filename, "Dispatching document");

        let reply = self
            .processor
            .submit(doc_id, &record.file_path, &record.original_filename)
            .await?;

        match reply {
            Some(reply) if reply.is_completed() && !reply.processed_images.is_empty() => {
                let images = reply.artifacts();
                info!(
                    doc_id = %doc_id,
                    images = images.len(),
                    "Processor completed inline, skipping status polling"
                );
                Ok(Some(images))
            }
            Some(reply) => {
                debug!(doc_id = %doc_id, status = %reply.status, "Submission accepted");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
