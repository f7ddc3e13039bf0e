//! OCR record persistence.

use rusqlite::{OptionalExtension, params};

use super::models::OcrRecord;
use super::{Database, OcrRecordStore};
use crate::error::{DatabaseError, ServiceResult};

const SELECT_COLUMNS: &str = "SELECT id, document_id, document_name, extracted_text, image_count, \
     processing_status, error_message, created_at, updated_at FROM ocr_records";

impl OcrRecordStore for Database {
    fn upsert_by_document_id(&self, record: &OcrRecord) -> ServiceResult<OcrRecord> {
        let conn = self.lock()?;

        // A second OCR run for the same document overwrites the previous result.
        conn.execute(
            r#"
            INSERT INTO ocr_records (id, document_id, document_name, extracted_text, image_count, processing_status, error_message, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(document_id) DO UPDATE SET
                document_name = excluded.document_name,
                extracted_text = excluded.extracted_text,
                image_count = excluded.image_count,
                processing_status = excluded.processing_status,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at
            "#,
            params![
                record.id,
                record.document_id,
                record.document_name,
                record.extracted_text,
                record.image_count as i64,
                record.processing_status.as_str(),
                record.error_message,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        let stored = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE document_id = ?1"),
                params![record.document_id],
                OcrRecord::from_row,
            )
            .map_err(DatabaseError::Query)?;

        Ok(stored)
    }

    fn find_by_document_id(&self, document_id: &str) -> ServiceResult<Option<OcrRecord>> {
        let conn = self.lock()?;

        conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE document_id = ?1"),
            params![document_id],
            OcrRecord::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    fn list_ocr_records(&self) -> ServiceResult<Vec<OcrRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC"))
            .map_err(DatabaseError::Query)?;

        let records = stmt
            .query_map([], OcrRecord::from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(records)
    }
}
