use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::products::store::{self, ProductStoreError};
use crate::types::ProductStatus;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unreadable CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
    #[error(transparent)]
    Store(#[from] ProductStoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    /// 1-based line number; the header is line 1.
    pub line: u64,
    pub message: String,
}

/// Import summary, recorded as the task result. Row-level failures are
/// partial: they show up here while the task still ends SUCCESS.
#[derive(Debug, Serialize)]
pub struct ImportOutcome {
    pub success_count: i64,
    pub total_processed: i64,
    pub errors: Vec<RowError>,
}

struct ColumnMap {
    sku: usize,
    name: usize,
    description: Option<usize>,
    status: Option<usize>,
}

/// Parse an assembled CSV upload and upsert products by sku.
///
/// Errors out of this function mean the file itself was unusable and
/// the task should fail; everything row-shaped is folded into the
/// outcome instead.
pub async fn run(pool: &SqlitePool, data: &[u8]) -> Result<ImportOutcome, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let columns = map_columns(reader.headers()?)?;

    let mut success_count = 0;
    let mut total_processed = 0;
    let mut errors = Vec::new();

    for (index, record) in reader.records().enumerate() {
        // Header occupies line 1.
        let line = index as u64 + 2;
        total_processed += 1;

        let record = match record {
            Ok(record) => record,
            Err(err) => {
                errors.push(RowError {
                    line,
                    message: format!("unparseable row: {err}"),
                });
                continue;
            }
        };

        let sku = record.get(columns.sku).unwrap_or("").trim();
        let name = record.get(columns.name).unwrap_or("").trim();
        if sku.is_empty() {
            errors.push(RowError {
                line,
                message: "sku is required".to_string(),
            });
            continue;
        }
        if name.is_empty() {
            errors.push(RowError {
                line,
                message: "name is required".to_string(),
            });
            continue;
        }

        let description = columns
            .description
            .and_then(|i| record.get(i))
            .unwrap_or("")
            .trim();

        let status_raw = columns
            .status
            .and_then(|i| record.get(i))
            .unwrap_or("")
            .trim();
        let status = if status_raw.is_empty() {
            ProductStatus::Active
        } else {
            match ProductStatus::parse(&status_raw.to_ascii_lowercase()) {
                Some(status) => status,
                None => {
                    errors.push(RowError {
                        line,
                        message: format!("unknown status: {status_raw}"),
                    });
                    continue;
                }
            }
        };

        // Database failures are not row-shaped; they abort the import.
        store::upsert_by_sku(pool, sku, name, description, status).await?;
        success_count += 1;
    }

    Ok(ImportOutcome {
        success_count,
        total_processed,
        errors,
    })
}

fn map_columns(headers: &csv::StringRecord) -> Result<ColumnMap, ImportError> {
    let position = |wanted: &str| {
        headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(wanted))
    };

    Ok(ColumnMap {
        sku: position("sku").ok_or(ImportError::MissingColumn("sku"))?,
        name: position("name").ok_or(ImportError::MissingColumn("name"))?,
        description: position("description"),
        status: position("status"),
    })
}
