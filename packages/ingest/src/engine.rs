//! Ingestion loop.
//!
//! A unit (region code, month) is paged until exhausted:
//!
//! ```text
//! PAGING ──(rejected status)──────────────▶ API_REJECTED
//!   │
//!   ├──(empty page)───────────────────────▶ DONE
//!   ├──(page_no × page_size ≥ total)──────▶ DONE
//!   └──(otherwise)──▶ next page
//! ```
//!
//! Every page is persisted (raw copy and trade rows, one transaction)
//! before the next page is requested. Units are independent: a failing
//! unit is logged and the job moves on.

use duckdb::Connection;
use proptech_database::DbError;
use proptech_database::trades::{create_trade_tables, insert_raw_page, write_trades};
use proptech_source::PageFetcher;
use proptech_source::response::parse_response;
use proptech_source::source_def::SourceDefinition;
use proptech_trade_models::{IngestionUnit, RawPage, YearMonth};

use crate::IngestError;

/// Terminal state of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// All pages were consumed.
    Done,
    /// The portal declared a non-success status.
    ApiRejected {
        /// `resultCode` from the portal.
        code: String,
        /// `resultMsg` from the portal.
        message: String,
    },
}

/// What happened while paging one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    /// The unit.
    pub unit: IngestionUnit,
    /// Terminal state.
    pub outcome: UnitOutcome,
    /// Pages fetched.
    pub pages: u32,
    /// Normalized records received.
    pub fetched: usize,
    /// Rows inserted or updated.
    pub written: usize,
    /// Items dropped as malformed.
    pub dropped: usize,
}

/// Totals for a feed across all of its units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Units attempted.
    pub units: usize,
    /// Units that ended in `DONE`.
    pub done: usize,
    /// Units that ended in `API_REJECTED`.
    pub rejected: usize,
    /// Units aborted by an error.
    pub failed: usize,
    /// Normalized records received.
    pub fetched: usize,
    /// Rows inserted or updated.
    pub written: usize,
    /// Items dropped as malformed.
    pub dropped: usize,
}

/// Pages through a single unit, committing each page before the next
/// fetch.
///
/// # Errors
///
/// Returns [`IngestError`] on transport, parse, or storage failure. Pages
/// committed before the failure stay committed.
pub async fn run_unit(
    conn: &mut Connection,
    source: &SourceDefinition,
    fetcher: &dyn PageFetcher,
    unit: &IngestionUnit,
) -> Result<UnitReport, IngestError> {
    let page_size = source.page_size();
    let mut report = UnitReport {
        unit: unit.clone(),
        outcome: UnitOutcome::Done,
        pages: 0,
        fetched: 0,
        written: 0,
        dropped: 0,
    };

    let mut page_no = 1u32;
    loop {
        let payload = fetcher
            .fetch(&unit.region_code, unit.period, page_no)
            .await?;
        report.pages += 1;

        let page = parse_response(source, &payload)?;

        let tx = conn.transaction().map_err(DbError::from)?;
        if let Some(raw_table) = &source.raw_table {
            let raw = RawPage {
                unit: unit.clone(),
                page_no,
                page_size,
                result_code: page.result_code.clone(),
                result_msg: page.result_msg.clone(),
                total_count: page.total_count,
                payload,
            };
            insert_raw_page(&tx, raw_table, &raw)?;
        }
        let counts = write_trades(&tx, source, &page.records)?;
        tx.commit().map_err(DbError::from)?;

        if page.is_rejected() {
            log::warn!(
                "{}: {unit} rejected on page {page_no}: {} {}",
                source.id,
                page.result_code,
                page.result_msg
            );
            report.outcome = UnitOutcome::ApiRejected {
                code: page.result_code,
                message: page.result_msg,
            };
            return Ok(report);
        }

        report.dropped += page.dropped;
        if page.records.is_empty() {
            log::debug!("{}: {unit} page {page_no} empty", source.id);
            break;
        }

        report.fetched += counts.attempted;
        report.written += counts.written;
        log::debug!(
            "{}: {unit} page {page_no}: {} records, {} written, total {}",
            source.id,
            counts.attempted,
            counts.written,
            page.total_count
        );

        if u64::from(page_no) * u64::from(page_size) >= page.total_count {
            break;
        }
        page_no += 1;
    }

    Ok(report)
}

/// Runs a feed across every region (outer) and month (inner).
///
/// Creates the feed's tables first. Unit failures are logged and counted;
/// they never stop sibling units.
///
/// # Errors
///
/// Returns [`IngestError`] only if the tables cannot be created.
pub async fn run_job(
    conn: &mut Connection,
    source: &SourceDefinition,
    fetcher: &dyn PageFetcher,
    regions: &[String],
    periods: &[YearMonth],
) -> Result<JobReport, IngestError> {
    create_trade_tables(conn, source)?;

    log::info!(
        "{}: {} region(s) × {} month(s)",
        source.name,
        regions.len(),
        periods.len()
    );

    let mut report = JobReport::default();
    for region in regions {
        for period in periods {
            let unit = IngestionUnit::new(region.clone(), *period);
            report.units += 1;

            match run_unit(conn, source, fetcher, &unit).await {
                Ok(unit_report) => {
                    match unit_report.outcome {
                        UnitOutcome::Done => report.done += 1,
                        UnitOutcome::ApiRejected { .. } => report.rejected += 1,
                    }
                    report.fetched += unit_report.fetched;
                    report.written += unit_report.written;
                    report.dropped += unit_report.dropped;
                    log::info!(
                        "{}: {unit} fetched={} written={} failed={}",
                        source.id,
                        unit_report.fetched,
                        unit_report.written,
                        unit_report.dropped
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    log::error!("{}: {unit} failed: {e}", source.id);
                }
            }
        }
    }

    log::info!(
        "{}: {} unit(s): {} done, {} rejected, {} failed; {} written, {} item(s) dropped",
        source.id,
        report.units,
        report.done,
        report.rejected,
        report.failed,
        report.written,
        report.dropped
    );

    Ok(report)
}
