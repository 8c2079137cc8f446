//! Idempotent writer for normalized trades and raw page copies.
//!
//! Trade tables are generated from the feed definition: the natural key
//! columns, the derived `deal_ymd`, then one column per attribute. The
//! primary key is the natural key, so re-ingesting a period never creates
//! duplicates.

use std::collections::BTreeMap;

use chrono::Datelike;
use duckdb::Connection;
use duckdb::types::Value;
use proptech_source::source_def::{DEAL_YMD_COLUMN, KEY_COLUMNS, SourceDefinition, WriteMode};
use proptech_trade_models::{FieldValue, RawPage, TradeKey, TradeRecord};

use crate::DbError;

/// Outcome of a [`write_trades`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    /// Records handed to the writer.
    pub attempted: usize,
    /// Rows inserted or updated.
    pub written: usize,
}

/// Creates the trade table, and the raw table if the feed preserves raw
/// pages.
///
/// # Errors
///
/// Returns [`DbError`] if the DDL fails.
pub fn create_trade_tables(conn: &Connection, source: &SourceDefinition) -> Result<(), DbError> {
    conn.execute_batch(&trade_table_ddl(source))?;

    if let Some(raw_table) = &source.raw_table {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {raw_table} (
                lawd_cd TEXT NOT NULL,
                deal_ymd TEXT NOT NULL,
                page_no INTEGER NOT NULL,
                num_of_rows INTEGER NOT NULL,
                result_code TEXT,
                result_msg TEXT,
                total_count BIGINT,
                payload TEXT NOT NULL,
                fetched_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
            );"
        ))?;
    }

    Ok(())
}

fn trade_table_ddl(source: &SourceDefinition) -> String {
    let mut columns = vec![
        "lawd_cd TEXT NOT NULL".to_string(),
        "umd_nm TEXT NOT NULL".to_string(),
        "apt_nm TEXT NOT NULL".to_string(),
        "jibun TEXT NOT NULL".to_string(),
        "deal_year INTEGER NOT NULL".to_string(),
        "deal_month INTEGER NOT NULL".to_string(),
        "deal_day INTEGER NOT NULL".to_string(),
        format!("{DEAL_YMD_COLUMN} TEXT NOT NULL"),
    ];
    columns.extend(
        source
            .fields
            .attributes
            .iter()
            .map(|a| format!("{} {}", a.column, a.kind.sql_type())),
    );
    columns.push("created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP".to_string());
    columns.push("updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP".to_string());
    columns.push(format!("PRIMARY KEY ({})", KEY_COLUMNS.join(", ")));

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        source.table,
        columns.join(",\n    ")
    )
}

fn insert_sql(source: &SourceDefinition) -> String {
    let attribute_columns = source.attribute_columns();

    let mut columns: Vec<&str> = KEY_COLUMNS.to_vec();
    columns.push(DEAL_YMD_COLUMN);
    columns.extend(&attribute_columns);

    let placeholders = vec!["?"; columns.len()].join(", ");

    let on_conflict = match source.write_mode {
        WriteMode::InsertOrIgnore => "DO NOTHING".to_string(),
        WriteMode::InsertOrUpdate => {
            let mut sets: Vec<String> = attribute_columns
                .iter()
                .map(|c| format!("{c} = EXCLUDED.{c}"))
                .collect();
            sets.push("updated_at = now()".to_string());
            format!("DO UPDATE SET {}", sets.join(", "))
        }
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT ({}) {on_conflict}",
        source.table,
        columns.join(", "),
        KEY_COLUMNS.join(", "),
    )
}

fn row_values(source: &SourceDefinition, record: &TradeRecord) -> Vec<Value> {
    let location = &record.key.location;
    let date = record.key.deal_date;

    let mut values = vec![
        Value::Text(location.region_code.clone()),
        Value::Text(location.neighborhood.clone()),
        Value::Text(location.building_name.clone()),
        Value::Text(location.lot_number_key().to_string()),
        Value::BigInt(i64::from(date.year())),
        Value::BigInt(i64::from(date.month())),
        Value::BigInt(i64::from(date.day())),
        Value::Text(record.key.deal_ymd().to_string()),
    ];

    values.extend(
        source
            .fields
            .attributes
            .iter()
            .map(|attr| match record.attribute(&attr.column) {
                Some(FieldValue::Integer(v)) => Value::BigInt(*v),
                Some(FieldValue::Decimal(v)) => Value::Double(*v),
                Some(FieldValue::Text(v)) => Value::Text(v.clone()),
                None => Value::Null,
            }),
    );

    values
}

/// Collapses records sharing a natural key. Insert-or-ignore keeps the
/// first occurrence (later ones would be ignored anyway); insert-or-update
/// keeps the last.
fn dedup_records(records: &[TradeRecord], mode: WriteMode) -> Vec<&TradeRecord> {
    let mut chosen: BTreeMap<&TradeKey, usize> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        match mode {
            WriteMode::InsertOrIgnore => {
                chosen.entry(&record.key).or_insert(i);
            }
            WriteMode::InsertOrUpdate => {
                chosen.insert(&record.key, i);
            }
        }
    }

    records
        .iter()
        .enumerate()
        .filter(|(i, r)| chosen.get(&r.key) == Some(i))
        .map(|(_, r)| r)
        .collect()
}

/// Writes normalized trades honouring the feed's write mode.
///
/// The caller owns the transaction; pass a [`duckdb::Transaction`] to make
/// the page atomic.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub fn write_trades(
    conn: &Connection,
    source: &SourceDefinition,
    records: &[TradeRecord],
) -> Result<WriteCounts, DbError> {
    let mut counts = WriteCounts {
        attempted: records.len(),
        written: 0,
    };
    if records.is_empty() {
        return Ok(counts);
    }

    let deduped = dedup_records(records, source.write_mode);
    if deduped.len() < records.len() {
        log::debug!(
            "{}: collapsed {} duplicate keys within batch",
            source.id,
            records.len() - deduped.len()
        );
    }

    let mut stmt = conn.prepare(&insert_sql(source))?;
    for record in deduped {
        counts.written += stmt.execute(duckdb::params_from_iter(row_values(source, record)))?;
    }

    Ok(counts)
}

/// Appends a verbatim page copy to `raw_table`.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails or the declared total does not
/// fit the column.
pub fn insert_raw_page(conn: &Connection, raw_table: &str, page: &RawPage) -> Result<(), DbError> {
    let total_count = i64::try_from(page.total_count).map_err(|_| DbError::Conversion {
        message: format!("total count {} out of range", page.total_count),
    })?;

    conn.execute(
        &format!(
            "INSERT INTO {raw_table} (
                lawd_cd, deal_ymd, page_no, num_of_rows,
                result_code, result_msg, total_count, payload
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ),
        duckdb::params![
            page.unit.region_code,
            page.unit.period.to_string(),
            page.page_no,
            page.page_size,
            page.result_code,
            page.result_msg,
            total_count,
            page.payload,
        ],
    )?;

    Ok(())
}
