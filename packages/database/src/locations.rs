//! Resolved building positions and the geocode failure log.

use std::collections::BTreeMap;

use duckdb::Connection;
use proptech_trade_models::{GeocodeFailure, LocationKey, LocationRecord};

use crate::DbError;
use crate::db::{FAILURE_TABLE, LOCATION_TABLE, table_exists};

/// Upserts resolved locations, overwriting coordinates and provenance on
/// conflict. Duplicate keys within the batch keep the last occurrence.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub fn upsert_locations(conn: &Connection, records: &[LocationRecord]) -> Result<usize, DbError> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut last_seen: BTreeMap<&LocationKey, usize> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        last_seen.insert(&record.key, i);
    }

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {LOCATION_TABLE} (
            lawd_cd, umd_nm, apt_nm, jibun,
            lat, lng, matched_address, place_id, strategy
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (lawd_cd, umd_nm, apt_nm, jibun) DO UPDATE SET
            lat = EXCLUDED.lat,
            lng = EXCLUDED.lng,
            matched_address = EXCLUDED.matched_address,
            place_id = EXCLUDED.place_id,
            strategy = EXCLUDED.strategy,
            updated_at = now()"
    ))?;

    let mut written = 0;
    for (i, record) in records.iter().enumerate() {
        if last_seen.get(&record.key) != Some(&i) {
            continue;
        }
        let key = &record.key;
        written += stmt.execute(duckdb::params![
            key.region_code,
            key.neighborhood,
            key.building_name,
            key.lot_number_key(),
            record.latitude,
            record.longitude,
            record.matched_address.as_deref(),
            record.place_id.as_deref(),
            record.strategy.as_ref(),
        ])?;
    }

    Ok(written)
}

/// Appends failure rows. Repeated failures for the same identity are kept.
///
/// # Errors
///
/// Returns [`DbError`] if any insert fails.
pub fn insert_geocode_failures(
    conn: &Connection,
    failures: &[GeocodeFailure],
) -> Result<usize, DbError> {
    if failures.is_empty() {
        return Ok(0);
    }

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {FAILURE_TABLE} (lawd_cd, umd_nm, apt_nm, jibun, query_text, reason)
         VALUES (?, ?, ?, ?, ?, ?)"
    ))?;

    let mut written = 0;
    for failure in failures {
        let key = &failure.key;
        written += stmt.execute(duckdb::params![
            key.region_code,
            key.neighborhood,
            key.building_name,
            key.lot_number_key(),
            failure.query_text,
            failure.reason,
        ])?;
    }

    Ok(written)
}

/// Selects distinct location identities found in `trade_tables` that have
/// no resolved location yet, restricted to `regions`, ordered by key.
///
/// Tables that do not exist yet are skipped.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn select_missing_locations(
    conn: &Connection,
    trade_tables: &[&str],
    regions: &[String],
    limit: Option<usize>,
) -> Result<Vec<LocationKey>, DbError> {
    let mut existing = Vec::new();
    for table in trade_tables {
        if table_exists(conn, table)? {
            existing.push(*table);
        }
    }
    if existing.is_empty() || regions.is_empty() {
        return Ok(Vec::new());
    }

    let union = existing
        .iter()
        .map(|t| format!("SELECT lawd_cd, umd_nm, apt_nm, jibun FROM {t}"))
        .collect::<Vec<_>>()
        .join(" UNION ");
    let placeholders = vec!["?"; regions.len()].join(", ");
    let limit_clause = limit.map_or_else(String::new, |n| format!(" LIMIT {n}"));

    let sql = format!(
        "SELECT DISTINCT t.lawd_cd, t.umd_nm, t.apt_nm, t.jibun
         FROM ({union}) t
         WHERE t.lawd_cd IN ({placeholders})
           AND NOT EXISTS (
               SELECT 1 FROM {LOCATION_TABLE} l
               WHERE l.lawd_cd = t.lawd_cd
                 AND l.umd_nm = t.umd_nm
                 AND l.apt_nm = t.apt_nm
                 AND l.jibun = t.jibun
           )
         ORDER BY t.lawd_cd, t.umd_nm, t.apt_nm, t.jibun{limit_clause}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(duckdb::params_from_iter(regions.iter()), |row| {
        let jibun: String = row.get(3)?;
        Ok(LocationKey {
            region_code: row.get(0)?,
            neighborhood: row.get(1)?,
            building_name: row.get(2)?,
            lot_number: (!jibun.is_empty()).then_some(jibun),
        })
    })?;

    let mut keys = Vec::new();
    for key in rows {
        keys.push(key?);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptech_source::registry::find_source;
    use proptech_trade_models::ResolutionStrategy;

    fn key(umd: &str, apt: &str, jibun: Option<&str>) -> LocationKey {
        LocationKey {
            region_code: "50110".to_string(),
            neighborhood: umd.to_string(),
            building_name: apt.to_string(),
            lot_number: jibun.map(String::from),
        }
    }

    fn located(key: LocationKey, lat: f64) -> LocationRecord {
        LocationRecord {
            key,
            latitude: lat,
            longitude: 126.48,
            matched_address: Some("제주특별자치도 제주시 노형동 925".to_string()),
            place_id: None,
            strategy: ResolutionStrategy::AddressSearch,
        }
    }

    fn find_location(conn: &Connection, key: &LocationKey) -> Option<LocationRecord> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT lat, lng, matched_address, place_id, strategy
                 FROM {LOCATION_TABLE}
                 WHERE lawd_cd = ? AND umd_nm = ? AND apt_nm = ? AND jibun = ?"
            ))
            .unwrap();
        let mut rows = stmt
            .query(duckdb::params![
                key.region_code,
                key.neighborhood,
                key.building_name,
                key.lot_number_key(),
            ])
            .unwrap();
        let row = rows.next().unwrap()?;
        let strategy: String = row.get(4).unwrap();
        Some(LocationRecord {
            key: key.clone(),
            latitude: row.get(0).unwrap(),
            longitude: row.get(1).unwrap(),
            matched_address: row.get(2).unwrap(),
            place_id: row.get(3).unwrap(),
            strategy: strategy.parse().unwrap(),
        })
    }

    fn count(conn: &Connection, table: &str) -> u64 {
        crate::db::count_rows(conn, table).unwrap().unwrap()
    }

    #[test]
    fn upsert_twice_equals_once() {
        let conn = crate::db::open_in_memory().unwrap();
        let records = vec![located(key("노형동", "A", Some("925")), 33.48)];
        upsert_locations(&conn, &records).unwrap();
        upsert_locations(&conn, &records).unwrap();

        assert_eq!(count(&conn, LOCATION_TABLE), 1);
        let stored = find_location(&conn, &records[0].key).unwrap();
        assert_eq!(stored, records[0]);
    }

    #[test]
    fn conflict_refreshes_updated_at() {
        let conn = crate::db::open_in_memory().unwrap();
        let k = key("노형동", "A", Some("925"));
        assert_eq!(upsert_locations(&conn, &[located(k.clone(), 33.48)]).unwrap(), 1);
        conn.execute_batch(
            "UPDATE apt_location SET updated_at = TIMESTAMPTZ '2000-01-01 00:00:00+00'",
        )
        .unwrap();

        assert_eq!(upsert_locations(&conn, &[located(k, 33.49)]).unwrap(), 1);
        let refreshed: bool = conn
            .query_row(
                "SELECT updated_at > TIMESTAMPTZ '2000-01-01 00:00:00+00' FROM apt_location",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(refreshed);
    }

    #[test]
    fn upsert_overwrites_position_and_provenance() {
        let conn = crate::db::open_in_memory().unwrap();
        let k = key("노형동", "A", None);
        upsert_locations(&conn, &[located(k.clone(), 33.48)]).unwrap();

        let mut moved = located(k.clone(), 33.50);
        moved.strategy = ResolutionStrategy::KeywordSearch;
        moved.place_id = Some("12345".to_string());
        upsert_locations(&conn, &[moved.clone()]).unwrap();

        let stored = find_location(&conn, &k).unwrap();
        assert_eq!(stored, moved);
        assert!(stored.key.lot_number.is_none());
    }

    #[test]
    fn in_batch_duplicates_keep_last() {
        let conn = crate::db::open_in_memory().unwrap();
        let k = key("연동", "B", Some("1"));
        let written = upsert_locations(&conn, &[located(k.clone(), 1.0), located(k.clone(), 2.0)])
            .unwrap();
        assert_eq!(written, 1);
        let stored = find_location(&conn, &k).unwrap();
        assert!((stored.latitude - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failures_are_never_deduplicated() {
        let conn = crate::db::open_in_memory().unwrap();
        let k = key("연동", "", None);
        let failure = GeocodeFailure {
            query_text: k.query_text(),
            key: k,
            reason: "no result".to_string(),
        };
        insert_geocode_failures(&conn, &[failure.clone()]).unwrap();
        insert_geocode_failures(&conn, &[failure]).unwrap();
        assert_eq!(count(&conn, FAILURE_TABLE), 2);
    }

    #[test]
    fn missing_locations_are_distinct_ordered_and_filtered() {
        let conn = crate::db::open_in_memory().unwrap();
        let sale = find_source("apt_trade").unwrap();
        let rent = find_source("apt_rent").unwrap();
        crate::trades::create_trade_tables(&conn, &sale).unwrap();
        crate::trades::create_trade_tables(&conn, &rent).unwrap();

        conn.execute_batch(
            "INSERT INTO apt_trade (lawd_cd, umd_nm, apt_nm, jibun, deal_year, deal_month, deal_day, deal_ymd, deal_amount_manwon)
             VALUES ('50110', '노형동', 'B', '2', 2024, 1, 1, '202401', 1),
                    ('50110', '노형동', 'B', '2', 2024, 1, 2, '202401', 1),
                    ('50110', '노형동', 'A', '', 2024, 1, 3, '202401', 1),
                    ('11110', '청운동', 'C', '5', 2024, 1, 3, '202401', 1);
             INSERT INTO apt_trade_rent (lawd_cd, umd_nm, apt_nm, jibun, deal_year, deal_month, deal_day, deal_ymd)
             VALUES ('50110', '노형동', 'B', '2', 2024, 2, 1, '202402'),
                    ('50110', '연동', 'D', '7', 2024, 2, 1, '202402');",
        )
        .unwrap();

        upsert_locations(&conn, &[located(key("연동", "D", Some("7")), 33.4)]).unwrap();

        let regions = vec!["50110".to_string()];
        let missing =
            select_missing_locations(&conn, &["apt_trade", "apt_trade_rent"], &regions, None)
                .unwrap();
        assert_eq!(
            missing,
            vec![key("노형동", "A", None), key("노형동", "B", Some("2"))]
        );

        let limited =
            select_missing_locations(&conn, &["apt_trade", "apt_trade_rent"], &regions, Some(1))
                .unwrap();
        assert_eq!(limited, vec![key("노형동", "A", None)]);
    }

    #[test]
    fn missing_tables_yield_no_candidates() {
        let conn = crate::db::open_in_memory().unwrap();
        let regions = vec!["50110".to_string()];
        assert!(
            select_missing_locations(&conn, &["apt_trade"], &regions, None)
                .unwrap()
                .is_empty()
        );
    }
}
