//! Bounded status polling against the external processor.

use tracing::{debug, info, warn};

use crate::error::{ProcessorError, ServiceResult, format_error_chain};
use crate::processor::ProcessorReply;
use crate::registry::ImageArtifact;
use crate::service::DocumentService;

const DEFAULT_REMOTE_FAILURE: &str = "Processing failed";

/// How a poll loop ended without error
#[derive(Debug)]
pub(crate) enum PollOutcome {
    Completed(Vec<ImageArtifact>),
    /// The registry entry was reclaimed while polling
    Cancelled,
}

impl DocumentService {
    /// Poll the processor until it reports a terminal status.
    ///
    /// At most `max_poll_attempts` status calls are made, `poll_interval`
    /// apart. Network and parse failures consume an attempt. The registry
    /// entry disappearing is the only cancellation signal and ends the loop
    /// with [`PollOutcome::Cancelled`].
    pub(crate) async fn poll_until_terminal(&self, doc_id: &str) -> ServiceResult<PollOutcome> {
        let max_attempts = self.config.processor.max_poll_attempts;
        let interval = self.config.processor.poll_interval();

        for attempt in 1..=max_attempts {
            if !self.registry.contains(doc_id) {
                debug!(doc_id = %doc_id, attempt, "Document reclaimed while polling");
                return Ok(PollOutcome::Cancelled);
            }

            match self.processor.status(doc_id).await {
                Ok(reply) if reply.is_completed() => {
                    info!(doc_id = %doc_id, attempt, "Processor reported completion");
                    let images = self.completed_images(doc_id, reply).await;
                    return Ok(PollOutcome::Completed(images));
                }
                Ok(reply) if reply.is_failed() => {
                    let message = reply
                        .message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_REMOTE_FAILURE.to_string());
                    return Err(ProcessorError::RemoteFailure { message }.into());
                }
                Ok(reply) => {
                    debug!(doc_id = %doc_id, attempt, status = %reply.status, "Document still processing");
                }
                Err(e) => {
                    warn!(
                        doc_id = %doc_id,
                        attempt,
                        error = %format_error_chain(&e),
                        "Status check failed"
                    );
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        if !self.registry.contains(doc_id) {
            return Ok(PollOutcome::Cancelled);
        }

        Err(ProcessorError::PollTimeout {
            document_id: doc_id.to_string(),
            attempts: max_attempts,
        }
        .into())
    }

    /// Image metadata for a completed document: the reply's list, else what
    /// the registry already holds, else one more status fetch.
    async fn completed_images(&self, doc_id: &str, reply: ProcessorReply) -> Vec<ImageArtifact> {
        let images = reply.artifacts();
        if !images.is_empty() {
            return images;
        }

        if let Some(record) = self.registry.get(doc_id)
            && !record.images.is_empty()
        {
            return record.images;
        }

        match self.processor.status(doc_id).await {
            Ok(reply) => reply.artifacts(),
            Err(e) => {
                warn!(
                    doc_id = %doc_id,
                    error = %format_error_chain(&e),
                    "Failed to fetch processed images"
                );
                Vec::new()
            }
        }
    }
}
