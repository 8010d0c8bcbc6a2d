//! Offline CSV import: normalize each row, resolve its dimensions, then
//! insert, refresh or skip the listing keyed by URL.

pub mod dedupe;
pub mod importer;
pub mod normalize;
pub mod resolver;
pub mod row;

use serde::Serialize;
use thiserror::Error;

use crate::error::ListingError;

pub use importer::{ImportOptions, Importer};
pub use resolver::DimensionCounts;

/// Outcome of a single imported row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeType {
    Created,
    Updated,
    NoChange,
}

/// Why a row was not imported. Only `Storage` aborts the run.
#[derive(Error, Debug)]
pub enum RowError {
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("Invalid value for required field {column}: {value:?}")]
    InvalidRequiredField { column: &'static str, value: String },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error(transparent)]
    Storage(#[from] ListingError),
}

impl From<rusqlite::Error> for RowError {
    fn from(err: rusqlite::Error) -> Self {
        RowError::Storage(err.into())
    }
}

impl RowError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RowError::Storage(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based line in the source file.
    pub line: u64,
    pub url: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows_seen: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub malformed_fields: usize,
    pub dimensions_created: DimensionCounts,
    pub failures: Vec<RowFailure>,
}

impl ImportSummary {
    pub fn record(&mut self, change: ChangeType) {
        match change {
            ChangeType::Created => self.created += 1,
            ChangeType::Updated => self.updated += 1,
            ChangeType::NoChange => self.skipped += 1,
        }
    }

    pub fn record_failure(&mut self, line: u64, url: Option<String>, reason: String) {
        self.failed += 1;
        self.failures.push(RowFailure { line, url, reason });
    }
}
