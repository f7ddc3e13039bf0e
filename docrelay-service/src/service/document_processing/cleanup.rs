//! Reclaim of transient files and registry entries.

use chrono::Utc;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::service::DocumentService;

/// Delete a file, treating an already missing file as success
pub(super) async fn remove_file_if_present(doc_id: &str, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(doc_id = %doc_id, path = %path.display(), "Removed file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(
            doc_id = %doc_id,
            path = %path.display(),
            error = %e,
            "Failed to remove file"
        ),
    }
}

impl DocumentService {
    /// Forget a document, then delete its page images and original.
    ///
    /// The entry is removed before any file is touched, so later pipeline
    /// updates for it fail instead of publishing images nobody will delete.
    /// Returns false when the id was not tracked. Calling this again for the
    /// same id changes nothing.
    pub async fn reclaim_document(&self, doc_id: &str) -> bool {
        let Some(record) = self.registry.remove(doc_id) else {
            debug!(doc_id = %doc_id, "Nothing to reclaim");
            return false;
        };

        for image in &record.images {
            if let Some(path) = self.processed_image_path(image) {
                remove_file_if_present(doc_id, &path).await;
            }
        }
        remove_file_if_present(doc_id, &record.file_path).await;

        info!(doc_id = %doc_id, images = record.images.len(), "Document resources reclaimed");
        true
    }

    /// Reclaim a document once the configured delay has passed
    pub(crate) fn schedule_reclaim(self: &Arc<Self>, doc_id: &str) {
        let cleanup = &self.config.cleanup;
        if !cleanup.enabled {
            debug!(doc_id = %doc_id, "Delayed cleanup disabled");
            return;
        }

        let delay = cleanup.delay();
        debug!(doc_id = %doc_id, delay_secs = delay.as_secs(), "Scheduling delayed cleanup");

        let service = Arc::clone(self);
        let doc_id = doc_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            service.reclaim_document(&doc_id).await;
        });
    }

    /// Reclaim every entry last updated more than `max_age` ago, in any status
    pub async fn sweep_stale_documents(&self, max_age: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            warn!(max_age_secs = max_age.as_secs(), "Cleanup max age out of range");
            return 0;
        };

        let mut reclaimed = 0;
        for doc_id in self.registry.stale_ids(cutoff) {
            if self.reclaim_document(&doc_id).await {
                reclaimed += 1;
            }
        }

        if reclaimed > 0 {
            info!(reclaimed, "Stale documents reclaimed");
        }
        reclaimed
    }
}
