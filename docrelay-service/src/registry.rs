//! In-memory registry of documents moving through the pipeline.
//!
//! Each entry is owned by the pipeline task spawned for it (single writer per
//! id); request handlers and the cleanup sweep only read. Every update
//! replaces the whole record under the shard lock, so readers never observe
//! a partially written record.

mod record;

pub use record::{DocumentRecord, DocumentStatus, ImageArtifact, StatusChange};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::path::PathBuf;

use crate::error::RegistryError;

/// Concurrency-safe store of [`DocumentRecord`]s keyed by document id
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    documents: DashMap<String, DocumentRecord>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a document in `Pending` status
    pub fn create(&self, id: &str, filename: &str, path: PathBuf) -> DocumentRecord {
        let record = DocumentRecord::new(id, filename, path);
        self.documents.insert(id.to_string(), record.clone());
        record
    }

    /// Snapshot of a document's current state
    pub fn get(&self, id: &str) -> Option<DocumentRecord> {
        self.documents.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Apply a status change, returning the record as published.
    ///
    /// Transitions are monotonic: `Pending -> Processing -> {Completed, Failed}`.
    /// A terminal record rejects any further change.
    pub fn update_status(
        &self,
        id: &str,
        change: StatusChange,
    ) -> Result<DocumentRecord, RegistryError> {
        let mut entry = self
            .documents
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound {
                document_id: id.to_string(),
            })?;

        let current = entry.status;
        let target = change.status();
        if !current.can_transition_to(target) {
            return Err(RegistryError::InvalidTransition {
                document_id: id.to_string(),
                from: current,
                to: target,
            });
        }

        let mut updated = entry.clone();
        updated.status = target;
        updated.updated_at = Utc::now();
        match change {
            StatusChange::Processing => {}
            StatusChange::Completed(images) => {
                if !images.is_empty() {
                    updated.images = images;
                }
            }
            StatusChange::Failed(message) => updated.error_message = Some(message),
        }

        *entry = updated.clone();
        Ok(updated)
    }

    /// Stop tracking a document. Unknown ids are a no-op.
    pub fn remove(&self, id: &str) -> Option<DocumentRecord> {
        self.documents.remove(id).map(|(_, record)| record)
    }

    /// Ids of entries last updated before `cutoff`, in any status
    pub fn stale_ids(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.documents
            .iter()
            .filter(|entry| entry.updated_at < cutoff)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
