use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use rusqlite::{Connection, Transaction};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};

use super::dedupe::{self, GateDecision};
use super::normalize::FieldCleaner;
use super::resolver::{self, is_unique_violation, DimensionCounts};
use super::row::{canonical_header, ListingRecord, RawListingRow};
use super::{ChangeType, ImportSummary, RowError};
use crate::error::{ListingError, Result};
use crate::models::{DimensionIds, ListingArgs};
use crate::repository::listings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Rows per committed sub-transaction; `0` commits once at the end.
    pub batch_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { batch_size: 500 }
    }
}

/// Drives a CSV file through normalization, dimension resolution and the
/// URL gate, writing one listing per row.
#[derive(Debug, Clone, Default)]
pub struct Importer {
    options: ImportOptions,
}

/// Column positions needed before a record is decoded.
struct Header {
    record: StringRecord,
    url_index: Option<usize>,
}

impl Importer {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    #[instrument(skip(self, conn, path), fields(path = %path.display()))]
    pub fn import_file(&self, conn: &mut Connection, path: &Path) -> Result<ImportSummary> {
        info!("Starting listing import");
        let file = File::open(path)?;
        self.import_reader(conn, file)
    }

    /// Imports comma-delimited UTF-8 CSV with a header row.
    pub fn import_reader<R: Read>(&self, conn: &mut Connection, input: R) -> Result<ImportSummary> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input);

        let record = canonical_header(reader.headers()?)?;
        let url_index = record.iter().position(|h| h == "url");
        let header = Header { record, url_index };
        let mut records = reader.into_records();
        let mut summary = ImportSummary::default();

        loop {
            let mut tx = conn.transaction()?;
            let exhausted = self.import_batch(&mut tx, &header, &mut records, &mut summary)?;
            tx.commit()?;
            debug!(rows_seen = summary.rows_seen, "Committed import batch");
            if exhausted {
                break;
            }
        }

        info!(
            rows_seen = summary.rows_seen,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            malformed_fields = summary.malformed_fields,
            dimensions_created = summary.dimensions_created.total(),
            "Finished listing import"
        );
        Ok(summary)
    }

    /// Imports up to `batch_size` rows into `tx`. Returns `true` once the
    /// input is exhausted. A fatal error drops `tx`, rolling the batch back.
    fn import_batch<R: Read>(
        &self,
        tx: &mut Transaction<'_>,
        header: &Header,
        records: &mut StringRecordsIntoIter<R>,
        summary: &mut ImportSummary,
    ) -> Result<bool> {
        let mut in_batch = 0;
        while self.options.batch_size == 0 || in_batch < self.options.batch_size {
            let Some(next) = records.next() else {
                return Ok(true);
            };
            in_batch += 1;
            summary.rows_seen += 1;
            // Header is line 1.
            let fallback_line = summary.rows_seen as u64 + 1;

            let record = match next {
                Ok(record) => record,
                Err(e) if e.is_io_error() => {
                    error!("Failed to read input, aborting import: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    let line = e.position().map_or(fallback_line, |p| p.line());
                    warn!(line, "Rejected row: {}", e);
                    summary.record_failure(line, None, format!("Malformed record: {e}"));
                    continue;
                }
            };

            let line = record.position().map_or(fallback_line, |p| p.line());
            let url = header
                .url_index
                .and_then(|i| record.get(i))
                .filter(|u| !u.is_empty())
                .map(str::to_string);

            match self.import_row(tx, header, &record, line, summary) {
                Ok(change) => summary.record(change),
                Err(e) if e.is_fatal() => {
                    error!(line, url = url.as_deref().unwrap_or(""), "Storage failure, aborting import: {}", e);
                    return Err(match e {
                        RowError::Storage(inner) => inner,
                        other => ListingError::Validation(other.to_string()),
                    });
                }
                Err(e) => {
                    warn!(line, url = url.as_deref().unwrap_or(""), "Rejected row: {}", e);
                    summary.record_failure(line, url, e.to_string());
                }
            }
        }
        Ok(false)
    }

    /// Runs one row inside a savepoint so a failure leaves no partial
    /// dimension rows behind.
    #[instrument(skip(self, tx, header, record, summary))]
    fn import_row(
        &self,
        tx: &mut Transaction<'_>,
        header: &Header,
        record: &StringRecord,
        line: u64,
        summary: &mut ImportSummary,
    ) -> std::result::Result<ChangeType, RowError> {
        let raw: RawListingRow = record
            .deserialize(Some(&header.record))
            .map_err(|e| RowError::MalformedRecord(e.to_string()))?;

        let mut cleaner = FieldCleaner::new();
        let normalized = raw.normalize(&mut cleaner);
        for field in cleaner.malformed() {
            warn!(
                line,
                column = field.column,
                kind = %field.kind,
                raw = %field.raw,
                "Malformed field stored as absent"
            );
        }
        summary.malformed_fields += cleaner.malformed().len();
        let listing_record = normalized?;

        let mut created = DimensionCounts::default();
        let savepoint = tx.savepoint()?;
        let change = write_listing(&savepoint, &listing_record, &mut created)?;
        savepoint.commit()?;

        summary.dimensions_created.add(&created);
        Ok(change)
    }
}

fn write_listing(
    conn: &Connection,
    record: &ListingRecord,
    created: &mut DimensionCounts,
) -> std::result::Result<ChangeType, RowError> {
    let dims = resolver::resolve_dimensions(conn, record, created)?;
    let decision = dedupe::check(conn, &record.listing, &dims)?;
    apply_decision(conn, &record.listing, &dims, decision, true)
}

/// A `New` listing whose insert hits the URL constraint is re-gated once and
/// routed to the update-or-skip path.
fn apply_decision(
    conn: &Connection,
    listing: &ListingArgs,
    dims: &DimensionIds,
    decision: GateDecision,
    retry_on_conflict: bool,
) -> std::result::Result<ChangeType, RowError> {
    match decision {
        GateDecision::New => match listings::insert(conn, listing, dims) {
            Ok(listing_id) => {
                info!("Created listing {} ({})", listing.url, listing_id);
                Ok(ChangeType::Created)
            }
            Err(ListingError::Database(e)) if retry_on_conflict && is_unique_violation(&e) => {
                warn!("Listing {} already exists, re-checking for changes", listing.url);
                let recheck = dedupe::check(conn, listing, dims)?;
                apply_decision(conn, listing, dims, recheck, false)
            }
            Err(e) => Err(e.into()),
        },
        GateDecision::DuplicateUpdate { listing_id } => {
            listings::update(conn, listing_id, listing, dims)?;
            info!("Updated listing {} ({})", listing.url, listing_id);
            Ok(ChangeType::Updated)
        }
        GateDecision::DuplicateUnchanged { listing_id } => {
            debug!("No changes needed for listing {} ({})", listing.url, listing_id);
            Ok(ChangeType::NoChange)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rust_decimal::Decimal;

    fn record(url: &str, price: &str) -> ListingRecord {
        RawListingRow {
            url: Some(url.to_string()),
            price_total_zl: Some(price.to_string()),
            rooms: Some("2".to_string()),
            ..Default::default()
        }
        .normalize(&mut FieldCleaner::new())
        .unwrap()
    }

    #[test]
    fn test_stale_new_decision_is_rerouted() {
        let conn = db::open_in_memory().unwrap();
        let first = record("http://x/1", "300000");
        let mut counts = DimensionCounts::default();
        assert_eq!(write_listing(&conn, &first, &mut counts).unwrap(), ChangeType::Created);
        assert_eq!(counts.total(), 4);

        let dims = resolver::resolve_dimensions(&conn, &first, &mut counts).unwrap();
        let mut changed = first.listing.clone();
        changed.price_total_zl = Some(Decimal::from(310_000));

        let change = apply_decision(&conn, &changed, &dims, GateDecision::New, true).unwrap();
        assert_eq!(change, ChangeType::Updated);
        let change = apply_decision(&conn, &changed, &dims, GateDecision::New, true).unwrap();
        assert_eq!(change, ChangeType::NoChange);
        assert_eq!(listings::count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_small_batches_import_every_row() {
        let mut conn = db::open_in_memory().unwrap();
        let csv = "url,price,rooms\n\
                   http://x/1,300000,2\n\
                   ,250000,1\n\
                   http://x/2,410 000 zł,3\n";
        let importer = Importer::new(ImportOptions { batch_size: 1 });
        let summary = importer.import_reader(&mut conn, csv.as_bytes()).unwrap();

        assert_eq!(summary.rows_seen, 3);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].line, 3);
        assert_eq!(listings::count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_single_transaction_mode() {
        let mut conn = db::open_in_memory().unwrap();
        let csv = "url,price\nhttp://x/1,100\nhttp://x/1,200\n";
        let importer = Importer::new(ImportOptions { batch_size: 0 });
        let summary = importer.import_reader(&mut conn, csv.as_bytes()).unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        let stored = listings::find_by_url(&conn, "http://x/1").unwrap().unwrap();
        assert_eq!(stored.price_total_zl, Some(Decimal::from(200)));
    }
}
