//! Download of produced page images into the processed directory.

use tracing::{debug, info, warn};

use crate::error::{StorageError, format_error_chain};
use crate::registry::ImageArtifact;
use crate::service::DocumentService;

use super::cleanup::remove_file_if_present;

impl DocumentService {
    /// Download each image in order and write it to the processed directory.
    ///
    /// A failed download or write is logged and skipped; the remaining images
    /// are still fetched. If the document is reclaimed while a download is in
    /// flight, the file written for it is removed again. Returns the number
    /// of images written.
    pub(crate) async fn materialize_images(&self, doc_id: &str, images: &[ImageArtifact]) -> usize {
        let mut saved = 0;

        for image in images {
            if !self.registry.contains(doc_id) {
                debug!(doc_id = %doc_id, "Document reclaimed during image download");
                break;
            }

            let Some(path) = self.processed_image_path(image) else {
                warn!(doc_id = %doc_id, image_id = %image.image_id, "Unusable image id, skipping");
                continue;
            };

            let bytes = match self.processor.download_image(doc_id, &image.image_id).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(
                        doc_id = %doc_id,
                        image_id = %image.image_id,
                        error = %format_error_chain(&e),
                        "Image download failed, skipping"
                    );
                    continue;
                }
            };

            if let Err(e) = tokio::fs::write(&path, &bytes).await {
                let err = StorageError::Write {
                    path: path.display().to_string(),
                    source: e,
                };
                warn!(
                    doc_id = %doc_id,
                    image_id = %image.image_id,
                    error = %format_error_chain(&err),
                    "Failed to store image, skipping"
                );
                continue;
            }

            if !self.registry.contains(doc_id) {
                remove_file_if_present(doc_id, &path).await;
                debug!(doc_id = %doc_id, "Document reclaimed during image download");
                break;
            }

            debug!(doc_id = %doc_id, image_id = %image.image_id, bytes = bytes.len(), "Image stored");
            saved += 1;
        }

        info!(doc_id = %doc_id, saved, total = images.len(), "Images materialized");
        saved
    }
}
