//! Batch driver that fills in missing building positions.
//!
//! The candidate identities are selected once, up front, in key order.
//! Each batch is resolved one identity at a time and its upserts and
//! failure rows are committed together. Identities that fail stay
//! unresolved and are picked up again by the next run.

use duckdb::Connection;
use proptech_database::DbError;
use proptech_database::locations::{
    insert_geocode_failures, select_missing_locations, upsert_locations,
};
use proptech_geocoder::LocalSearch;
use proptech_geocoder::resolver::{Resolution, Resolver};

use crate::IngestError;

/// Knobs for [`fill_locations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOptions {
    /// Identities per committed batch (at least 1).
    pub batch_size: usize,
    /// Cap on identities processed in this run.
    pub limit: Option<usize>,
}

/// Totals for a fill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Batches committed.
    pub batches: usize,
    /// Identities attempted.
    pub processed: usize,
    /// Identities resolved.
    pub upserted: usize,
    /// Identities recorded as failures.
    pub failed: usize,
}

/// Resolves every identity in `trade_tables` that has no position yet.
///
/// # Errors
///
/// Returns [`IngestError`] if selecting candidates or committing a batch
/// fails. Lookup failures never surface here; they become failure rows.
pub async fn fill_locations<S: LocalSearch>(
    conn: &mut Connection,
    resolver: &Resolver<S>,
    trade_tables: &[&str],
    regions: &[String],
    options: FillOptions,
) -> Result<FillReport, IngestError> {
    let candidates = select_missing_locations(conn, trade_tables, regions, options.limit)?;

    let mut report = FillReport::default();
    if candidates.is_empty() {
        log::info!("No missing locations");
        return Ok(report);
    }
    log::info!("Geocoding {} location(s)", candidates.len());

    for batch in candidates.chunks(options.batch_size.max(1)) {
        let mut upserts = Vec::new();
        let mut failures = Vec::new();

        for key in batch {
            match resolver.resolve_or_fail(key).await {
                Resolution::Resolved(record) => upserts.push(record),
                Resolution::Failed(failure) => failures.push(failure),
            }
        }

        let tx = conn.transaction().map_err(DbError::from)?;
        upsert_locations(&tx, &upserts)?;
        insert_geocode_failures(&tx, &failures)?;
        tx.commit().map_err(DbError::from)?;

        report.batches += 1;
        report.processed += batch.len();
        report.upserted += upserts.len();
        report.failed += failures.len();

        log::info!(
            "batch_done={} upserted={} fails={} total_processed={}",
            batch.len(),
            upserts.len(),
            failures.len(),
            report.processed
        );
    }

    Ok(report)
}
