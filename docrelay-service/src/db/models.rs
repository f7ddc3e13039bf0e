//! Database model structs.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// Processing status of an OCR record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl OcrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrStatus::Pending => "pending",
            OcrStatus::Processing => "processing",
            OcrStatus::Completed => "completed",
            OcrStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "processing" => OcrStatus::Processing,
            "completed" => OcrStatus::Completed,
            "failed" => OcrStatus::Failed,
            _ => OcrStatus::Pending,
        }
    }
}

/// Durable OCR result for one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrRecord {
    pub id: String,
    pub document_id: String,
    pub document_name: String,
    /// Concatenated `=== Page N ===` sections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    pub image_count: usize,
    pub processing_status: OcrStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl OcrRecord {
    /// Fresh record for a document whose OCR is about to start
    pub fn processing(document_id: &str, document_name: &str, image_count: usize) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            document_name: document_name.to_string(),
            extracted_text: None,
            image_count,
            processing_status: OcrStatus::Processing,
            created_at: now,
            updated_at: now,
            error_message: None,
        }
    }

    /// Column order: id, document_id, document_name, extracted_text, image_count,
    /// processing_status, error_message, created_at, updated_at
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status: String = row.get(5)?;
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;
        let image_count: i64 = row.get(4)?;

        Ok(Self {
            id: row.get(0)?,
            document_id: row.get(1)?,
            document_name: row.get(2)?,
            extracted_text: row.get(3)?,
            image_count: image_count.max(0) as usize,
            processing_status: OcrStatus::from_str(&status),
            error_message: row.get(6)?,
            created_at: parse_timestamp(7, "created_at", &created_at)?,
            updated_at: parse_timestamp(8, "updated_at", &updated_at)?,
        })
    }
}

fn parse_timestamp(
    index: usize,
    column: &'static str,
    value: &str,
) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                Box::new(DatabaseError::Timestamp {
                    column,
                    value: value.to_string(),
                }),
            )
        })
}
