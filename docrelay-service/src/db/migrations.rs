//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// Called during database initialization; every statement is idempotent.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS ocr_records (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL UNIQUE,
            document_name TEXT NOT NULL,
            extracted_text TEXT,
            image_count INTEGER NOT NULL DEFAULT 0,
            processing_status TEXT NOT NULL DEFAULT 'pending',
            error_message TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_ocr_records_status ON ocr_records(processing_status);
        "#,
    )
    .map_err(DatabaseError::Query)?;

    Ok(())
}
