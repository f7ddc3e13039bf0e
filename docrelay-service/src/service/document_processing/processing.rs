//! Main document processing pipeline.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{RegistryError, ServiceError, format_error_chain};
use crate::registry::{DocumentRecord, StatusChange};
use crate::service::DocumentService;

use super::polling::PollOutcome;

impl DocumentService {
    /// Run the pipeline for a freshly registered document on its own task
    pub(crate) fn spawn_pipeline(self: &Arc<Self>, record: DocumentRecord) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.run_pipeline(record).await;
        });
    }

    /// Dispatch, poll, download and extract for one document.
    ///
    /// Stage failures are written to the registry as `Failed`; nothing is
    /// returned to a caller. A missing registry entry at any step means the
    /// document was reclaimed and the pipeline stops quietly.
    pub(crate) async fn run_pipeline(self: &Arc<Self>, record: DocumentRecord) {
        let doc_id = record.id.as_str();
        info!(doc_id = %doc_id, filename = %record.original_filename, "Starting document processing");

        if let Err(e) = self.registry.update_status(doc_id, StatusChange::Processing) {
            self.registry_stop(doc_id, &e);
            return;
        }

        let images = match self.dispatch_document(&record).await {
            Ok(Some(images)) => images,
            Ok(None) => match self.poll_until_terminal(doc_id).await {
                Ok(PollOutcome::Completed(images)) => images,
                Ok(PollOutcome::Cancelled) => {
                    info!(doc_id = %doc_id, "Document reclaimed before completion, stopping");
                    return;
                }
                Err(e) => {
                    self.fail_document(doc_id, &e);
                    return;
                }
            },
            Err(e) => {
                self.fail_document(doc_id, &e);
                return;
            }
        };

        let completed = match self
            .registry
            .update_status(doc_id, StatusChange::Completed(images))
        {
            Ok(record) => record,
            Err(e) => {
                self.registry_stop(doc_id, &e);
                return;
            }
        };
        info!(doc_id = %doc_id, images = completed.images.len(), "Document processed successfully");

        self.materialize_images(doc_id, &completed.images).await;

        // The document stays Completed; a failed extraction is recorded on the OCR record
        if let Err(e) = self
            .extract_text(doc_id, &completed.original_filename, &completed.images)
            .await
        {
            error!(doc_id = %doc_id, error = %format_error_chain(&e), "OCR processing failed");
        }

        self.schedule_reclaim(doc_id);
    }

    /// Record a stage failure and schedule the document's reclaim
    fn fail_document(self: &Arc<Self>, doc_id: &str, err: &ServiceError) {
        let message = format_error_chain(err);
        error!(doc_id = %doc_id, error = %message, "Document processing failed");

        match self
            .registry
            .update_status(doc_id, StatusChange::Failed(message))
        {
            Ok(_) => self.schedule_reclaim(doc_id),
            Err(e) => self.registry_stop(doc_id, &e),
        }
    }

    fn registry_stop(&self, doc_id: &str, err: &RegistryError) {
        match err {
            RegistryError::NotFound { .. } => {
                debug!(doc_id = %doc_id, "Document no longer tracked, stopping");
            }
            RegistryError::InvalidTransition { .. } => {
                warn!(doc_id = %doc_id, error = %err, "Rejected status update, stopping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;
    use std::time::Duration;

    use crate::db::{OcrRecord, OcrStatus};
    use crate::registry::{DocumentRecord, DocumentStatus};
    use crate::service::DocumentService;
    use crate::test_support::{
        FlakyStore, MockProcessor, TestHarness, failed_reply, reply, wait_for,
    };

    const WAIT: Duration = Duration::from_secs(5);

    async fn wait_for_terminal(service: &DocumentService, doc_id: &str) -> DocumentRecord {
        wait_for(WAIT, || {
            ready(
                service
                    .registry
                    .get(doc_id)
                    .filter(|record| record.status.is_terminal()),
            )
        })
        .await
    }

    async fn wait_for_ocr(service: &DocumentService, doc_id: &str) -> OcrRecord {
        wait_for(WAIT, || {
            ready(
                service
                    .ocr_store
                    .find_by_document_id(doc_id)
                    .unwrap()
                    .filter(|record| {
                        matches!(
                            record.processing_status,
                            OcrStatus::Completed | OcrStatus::Failed
                        )
                    }),
            )
        })
        .await
    }

    #[tokio::test]
    async fn test_invoice_end_to_end() {
        let mock = MockProcessor::builder()
            .status_replies(vec![reply("completed", &["p1", "p2"])])
            .image("p1", b"INV-001")
            .image("p2", b"  \n\t ")
            .spawn()
            .await;
        let harness = TestHarness::new(&mock.base_url);

        let record = harness
            .service
            .submit_document(b"%PDF-1.7 invoice", "invoice.pdf")
            .await
            .unwrap();

        let ocr = wait_for_ocr(&harness.service, &record.id).await;
        assert_eq!(ocr.processing_status, OcrStatus::Completed);
        assert_eq!(ocr.extracted_text.as_deref(), Some("=== Page 1 ===\nINV-001\n\n"));
        assert_eq!(ocr.document_name, "invoice.pdf");
        assert_eq!(ocr.image_count, 2);

        let report = harness.service.document_status(&record.id).unwrap();
        assert_eq!(report.status, DocumentStatus::Completed);
        assert_eq!(report.progress, 100);
        assert_eq!(report.processed_images, ["p1", "p2"]);

        let submissions = mock.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].document_id, record.id);
        assert_eq!(submissions[0].filename, "invoice.pdf");
    }

    #[tokio::test]
    async fn test_inline_completion_skips_polling() {
        let mock = MockProcessor::builder()
            .submit_reply(reply("completed", &["p1"]))
            .image("p1", b"Quick")
            .spawn()
            .await;
        let harness = TestHarness::new(&mock.base_url);

        let record = harness
            .service
            .submit_document(b"%PDF", "quick.pdf")
            .await
            .unwrap();

        let ocr = wait_for_ocr(&harness.service, &record.id).await;
        assert_eq!(ocr.extracted_text.as_deref(), Some("=== Page 1 ===\nQuick\n\n"));
        assert_eq!(mock.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_partial_download_failure_keeps_other_pages() {
        let mock = MockProcessor::builder()
            .status_replies(vec![reply("completed", &["p1", "p2", "p3"])])
            .image("p1", b"one")
            .image("p3", b"three")
            .spawn()
            .await;
        let harness = TestHarness::new(&mock.base_url);

        let record = harness
            .service
            .submit_document(b"%PDF", "scan.pdf")
            .await
            .unwrap();

        let ocr = wait_for_ocr(&harness.service, &record.id).await;
        assert_eq!(ocr.processing_status, OcrStatus::Completed);
        assert_eq!(
            ocr.extracted_text.as_deref(),
            Some("=== Page 1 ===\none\n\n=== Page 3 ===\nthree\n\n")
        );
        let final_record = harness.service.registry.get(&record.id).unwrap();
        assert_eq!(final_record.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_poll_timeout_fails_document() {
        let mock = MockProcessor::builder()
            .status_replies(vec![reply("processing", &[])])
            .spawn()
            .await;
        let harness = TestHarness::new(&mock.base_url);

        let record = harness
            .service
            .submit_document(b"%PDF", "slow.pdf")
            .await
            .unwrap();

        let failed = wait_for_terminal(&harness.service, &record.id).await;
        assert_eq!(failed.status, DocumentStatus::Failed);
        let message = failed.error_message.unwrap();
        assert!(message.contains("timeout"), "unexpected message: {message}");
        assert_eq!(mock.status_calls(), 5);

        // Still queryable until reclaimed
        let report = harness.service.document_status(&record.id).unwrap();
        assert_eq!(report.status, DocumentStatus::Failed);
        assert_eq!(report.progress, 0);
        assert!(
            harness
                .service
                .ocr_store
                .find_by_document_id(&record.id)
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_remote_failure_message_reaches_record() {
        let mock = MockProcessor::builder()
            .status_replies(vec![reply("processing", &[]), failed_reply("corrupt PDF stream")])
            .spawn()
            .await;
        let harness = TestHarness::new(&mock.base_url);

        let record = harness
            .service
            .submit_document(b"%PDF", "broken.pdf")
            .await
            .unwrap();

        let failed = wait_for_terminal(&harness.service, &record.id).await;
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("corrupt PDF stream"));
    }

    #[tokio::test]
    async fn test_rejected_submission_fails_without_polling() {
        let mock = MockProcessor::builder().reject_submit().spawn().await;
        let harness = TestHarness::new(&mock.base_url);

        let record = harness
            .service
            .submit_document(b"%PDF", "rejected.pdf")
            .await
            .unwrap();

        let failed = wait_for_terminal(&harness.service, &record.id).await;
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert!(failed.error_message.is_some());
        assert_eq!(mock.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_observed_statuses_are_monotonic() {
        let mock = MockProcessor::builder()
            .status_replies(vec![
                reply("processing", &[]),
                reply("processing", &[]),
                reply("completed", &["p1"]),
            ])
            .image("p1", b"text")
            .spawn()
            .await;
        let harness = TestHarness::new(&mock.base_url);

        let record = harness
            .service
            .submit_document(b"%PDF", "watch.pdf")
            .await
            .unwrap();

        let mut observed = vec![record.status];
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let current = harness.service.registry.get(&record.id).unwrap();
            if observed.last() != Some(&current.status) {
                observed.push(current.status);
            }
            if current.status.is_terminal() || tokio::time::Instant::now() > deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(observed.first(), Some(&DocumentStatus::Pending));
        assert_eq!(observed.last(), Some(&DocumentStatus::Completed));
        for pair in observed.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "non-monotonic sequence: {observed:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_ocr_batch_failure_keeps_document_completed() {
        let mock = MockProcessor::builder()
            .status_replies(vec![reply("completed", &["p1"])])
            .image("p1", b"text")
            .spawn()
            .await;
        let store = std::sync::Arc::new(FlakyStore::failing_on(OcrStatus::Completed));
        let harness = TestHarness::with_store(&mock.base_url, store, |_| {});

        let record = harness
            .service
            .submit_document(b"%PDF", "scan.pdf")
            .await
            .unwrap();

        let ocr = wait_for_ocr(&harness.service, &record.id).await;
        assert_eq!(ocr.processing_status, OcrStatus::Failed);
        assert!(ocr.error_message.is_some());

        let final_record = harness.service.registry.get(&record.id).unwrap();
        assert_eq!(final_record.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_reclaimed_document_stops_pipeline_quietly() {
        let mock = MockProcessor::builder()
            .status_replies(vec![reply("processing", &[])])
            .spawn()
            .await;
        let harness = TestHarness::with_config(&mock.base_url, |config| {
            config.processor.max_poll_attempts = 100;
        });

        let record = harness
            .service
            .submit_document(b"%PDF", "abandoned.pdf")
            .await
            .unwrap();

        wait_for(WAIT, || ready((mock.status_calls() > 0).then_some(()))).await;
        assert!(harness.service.reclaim_document(&record.id).await);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let calls = mock.status_calls();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mock.status_calls(), calls);
        assert!(harness.service.registry.get(&record.id).is_none());
        assert!(!record.file_path.exists());
    }

    #[tokio::test]
    async fn test_completed_document_is_reclaimed_after_delay() {
        let mock = MockProcessor::builder()
            .status_replies(vec![reply("completed", &["p1"])])
            .image("p1", b"text")
            .spawn()
            .await;
        let harness = TestHarness::with_config(&mock.base_url, |config| {
            config.cleanup.enabled = true;
            config.cleanup.delay_secs = 0;
        });

        let record = harness
            .service
            .submit_document(b"%PDF", "scan.pdf")
            .await
            .unwrap();

        wait_for_ocr(&harness.service, &record.id).await;
        wait_for(WAIT, || {
            ready((!harness.service.registry.contains(&record.id)).then_some(()))
        })
        .await;

        assert!(!record.file_path.exists());
        assert!(!harness.service.config.storage.processed_dir.join("p1.png").exists());
        // The durable result outlives the transient record
        assert!(
            harness
                .service
                .ocr_store
                .find_by_document_id(&record.id)
                .unwrap()
                .is_some()
        );
    }
}
