//! Database module for SQLite operations.
//!
//! Holds the durable OCR results. Document pipeline state is transient and
//! lives in the [`crate::registry`] instead.

mod migrations;
pub mod models;
mod ocr_records;

pub use models::{OcrRecord, OcrStatus};

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{DatabaseError, ServiceError, ServiceResult};

/// Durable store for OCR results, one record per document id
pub trait OcrRecordStore: Send + Sync {
    /// Insert the record, or overwrite the existing record for the same
    /// document id. The stored id and `created_at` of an existing record win.
    fn upsert_by_document_id(&self, record: &OcrRecord) -> ServiceResult<OcrRecord>;

    fn find_by_document_id(&self, document_id: &str) -> ServiceResult<Option<OcrRecord>>;

    /// All records, newest first
    fn list_ocr_records(&self) -> ServiceResult<Vec<OcrRecord>>;
}

/// Database manager for SQLite operations
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> ServiceResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServiceError::Database(DatabaseError::Connection(
                    rusqlite::Error::ToSqlConversionFailure(Box::new(e)),
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(DatabaseError::Connection)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(DatabaseError::Query)?;

        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> ServiceResult<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> ServiceResult<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}
