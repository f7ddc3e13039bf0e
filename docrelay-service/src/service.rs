//! Document service: the per-document pipeline and everything it touches.

mod document_processing;

pub use document_processing::{DocumentStatusReport, start_cleanup_sweeper};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::ServiceConfig;
use crate::db::OcrRecordStore;
use crate::error::{ServiceResult, StorageError};
use crate::ocr::OcrEngine;
use crate::processor::ProcessorClient;
use crate::registry::{DocumentRegistry, ImageArtifact};

/// Main service coordinator, constructed once at startup
pub struct DocumentService {
    pub config: Arc<ServiceConfig>,
    pub registry: Arc<DocumentRegistry>,
    pub processor: Arc<ProcessorClient>,
    pub ocr_engine: Arc<dyn OcrEngine>,
    pub ocr_store: Arc<dyn OcrRecordStore>,
}

impl DocumentService {
    pub fn new(
        config: Arc<ServiceConfig>,
        ocr_engine: Arc<dyn OcrEngine>,
        ocr_store: Arc<dyn OcrRecordStore>,
    ) -> ServiceResult<Self> {
        info!("Initializing document service");

        for dir in [&config.storage.upload_dir, &config.storage.processed_dir] {
            std::fs::create_dir_all(dir).map_err(|e| StorageError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }

        let processor = Arc::new(ProcessorClient::new(&config.processor)?);

        info!(
            processor = %config.processor.base_url,
            ocr_engine = ocr_engine.name(),
            "Document service initialized"
        );

        Ok(Self {
            config,
            registry: Arc::new(DocumentRegistry::new()),
            processor,
            ocr_engine,
            ocr_store,
        })
    }

    /// Where a materialized page image lives on disk.
    ///
    /// `None` when the image id is not a plain file name and would resolve
    /// outside the processed directory.
    pub fn processed_image_path(&self, image: &ImageArtifact) -> Option<PathBuf> {
        image.has_plain_id().then(|| {
            self.config
                .storage
                .processed_dir
                .join(image.local_file_name())
        })
    }
}
