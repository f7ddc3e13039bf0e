//! Client for the external page-image processor.
//!
//! The processor accepts a document, renders it into page images and reports
//! progress through a status endpoint. All calls carry the shared API key.

use bytes::Bytes;
use reqwest::{Client, Url, multipart};
use serde::Deserialize;
use std::path::Path;

use crate::config::ProcessorConfig;
use crate::error::{ProcessorError, ServiceError, ServiceResult, StorageError};
use crate::registry::ImageArtifact;

const API_KEY_HEADER: &str = "X-API-KEY";

/// Processor API client
pub struct ProcessorClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

/// Reply shape shared by the submit and status endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessorReply {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub processed_images: Vec<ProcessedImage>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProcessorReply {
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("completed")
    }

    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("failed")
    }

    /// Image metadata in the order the processor listed it. Images whose id
    /// is not a plain file name are dropped.
    pub fn artifacts(&self) -> Vec<ImageArtifact> {
        self.processed_images
            .iter()
            .cloned()
            .map(ImageArtifact::from)
            .filter(|artifact| {
                let plain = artifact.has_plain_id();
                if !plain {
                    tracing::warn!(image_id = %artifact.image_id, "Ignoring image with unusable id");
                }
                plain
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessedImage {
    pub image_id: String,
    #[serde(default)]
    pub image_path: String,
    #[serde(default)]
    pub dpi: u32,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub size_kb: f64,
}

impl From<ProcessedImage> for ImageArtifact {
    fn from(image: ProcessedImage) -> Self {
        Self {
            image_id: image.image_id,
            image_path: image.image_path,
            dpi: image.dpi,
            format: image.format,
            size_kb: image.size_kb,
        }
    }
}

impl ProcessorClient {
    /// Create a new processor client with the configured connect/read timeouts
    pub fn new(config: &ProcessorConfig) -> ServiceResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ServiceError::Config {
                message: format!("Invalid processor base URL: {}", config.base_url),
            })?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to build processor HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Endpoint URL under the base URL, with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Submit a document for processing.
    ///
    /// A transport failure or non-success HTTP status is an error. A body that
    /// cannot be parsed is returned as `Ok(None)`: the submission itself was
    /// accepted and the caller falls back to polling.
    pub async fn submit(
        &self,
        document_id: &str,
        file_path: &Path,
        filename: &str,
    ) -> ServiceResult<Option<ProcessorReply>> {
        let url = self.endpoint(&["process"]);

        let content = tokio::fs::read(file_path)
            .await
            .map_err(|e| StorageError::Read {
                path: file_path.display().to_string(),
                source: e,
            })?;

        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(content).file_name(filename.to_string()),
            )
            .text("document_id", document_id.to_string());

        let response = self
            .client
            .post(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProcessorError::Dispatch {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::Processor(ProcessorError::Rejected {
                url: url.to_string(),
                status: response.status().as_u16(),
            }));
        }

        match response.json::<ProcessorReply>().await {
            Ok(reply) => Ok(Some(reply)),
            Err(e) => {
                tracing::warn!(doc_id = %document_id, error = %e, "Unparseable submit reply");
                Ok(None)
            }
        }
    }

    /// Fetch the processor's current view of a document
    pub async fn status(&self, document_id: &str) -> ServiceResult<ProcessorReply> {
        let url = self.endpoint(&["status", document_id]);

        let response = self
            .client
            .get(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| ProcessorError::Dispatch {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::Processor(ProcessorError::Rejected {
                url: url.to_string(),
                status: response.status().as_u16(),
            }));
        }

        let reply = response
            .json::<ProcessorReply>()
            .await
            .map_err(|e| ProcessorError::InvalidResponse { source: e })?;

        Ok(reply)
    }

    /// Download the raw bytes of one produced image
    pub async fn download_image(
        &self,
        document_id: &str,
        image_id: &str,
    ) -> Result<Bytes, ProcessorError> {
        let url = self.endpoint(&["download", document_id, image_id]);

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ProcessorError::ImageDownload {
                image_id: image_id.to_string(),
                source: Box::new(e),
            })?;

        response
            .bytes()
            .await
            .map_err(|e| ProcessorError::ImageDownload {
                image_id: image_id.to_string(),
                source: Box::new(e),
            })
    }
}
