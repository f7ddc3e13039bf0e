//! Registry record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Pipeline status of a tracked document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Accepted, pipeline task not yet started
    Pending,
    /// Submitted to the processor, awaiting a terminal reply
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }

    /// Position in the status order; terminal states share the last rank.
    fn rank(&self) -> u8 {
        match self {
            DocumentStatus::Pending => 0,
            DocumentStatus::Processing => 1,
            DocumentStatus::Completed | DocumentStatus::Failed => 2,
        }
    }

    /// Statuses only move forward and terminal statuses never change.
    /// `Pending -> Failed` is allowed so intake-stage failures can be recorded.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Coarse progress percentage reported to callers
    pub fn progress(&self) -> u8 {
        match self {
            DocumentStatus::Pending => 0,
            DocumentStatus::Processing => 50,
            DocumentStatus::Completed => 100,
            DocumentStatus::Failed => 0,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "Document awaiting processing",
            DocumentStatus::Processing => "Document processing",
            DocumentStatus::Completed => "Document processed successfully",
            DocumentStatus::Failed => "Error processing document",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page image produced by the processor. Order within a document is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageArtifact {
    pub image_id: String,
    pub image_path: String,
    pub dpi: u32,
    pub format: String,
    pub size_kb: f64,
}

impl ImageArtifact {
    /// Whether the id is a single plain file name, safe to join onto a
    /// local directory
    pub fn has_plain_id(&self) -> bool {
        let mut components = Path::new(&self.image_id).components();
        matches!(components.next(), Some(Component::Normal(_)))
            && components.next().is_none()
            && !self.image_id.contains(['/', '\\'])
    }

    /// File name used when the image is materialized locally
    pub fn local_file_name(&self) -> String {
        let extension = match self.format.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => "jpg",
            "tif" | "tiff" => "tiff",
            "webp" => "webp",
            "bmp" => "bmp",
            _ => "png",
        };
        format!("{}.{}", self.image_id, extension)
    }
}

/// A status update together with the data that travels with it
#[derive(Debug, Clone)]
pub enum StatusChange {
    Processing,
    /// Completion with the produced images. An empty list keeps any images
    /// already recorded.
    Completed(Vec<ImageArtifact>),
    Failed(String),
}

impl StatusChange {
    pub fn status(&self) -> DocumentStatus {
        match self {
            StatusChange::Processing => DocumentStatus::Processing,
            StatusChange::Completed(_) => DocumentStatus::Completed,
            StatusChange::Failed(_) => DocumentStatus::Failed,
        }
    }
}

/// Transient per-document pipeline state
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub original_filename: String,
    pub file_path: PathBuf,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub images: Vec<ImageArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DocumentRecord {
    pub fn new(id: &str, filename: &str, file_path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            original_filename: filename.to_string(),
            file_path,
            status: DocumentStatus::Pending,
            created_at: now,
            updated_at: now,
            images: Vec::new(),
            error_message: None,
        }
    }

    pub fn image(&self, image_id: &str) -> Option<&ImageArtifact> {
        self.images.iter().find(|image| image.image_id == image_id)
    }
}
