use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use super::{decimal_column, decimal_to_sql, timestamp_column, timestamp_to_sql};
use crate::error::{ListingError, Result};
use crate::models::{NewSavedFilter, SavedFilter};

const FILTER_COLUMNS: &str = "filter_id, name, price_min, price_max, price_sqm_min, price_sqm_max, \
     rooms, city, city_district, created_at";

fn saved_filter_from_row(row: &Row<'_>) -> rusqlite::Result<SavedFilter> {
    let filter_id: i64 = row.get(0)?;
    let rooms: Option<String> = row.get(6)?;
    Ok(SavedFilter {
        filter_id,
        name: row.get(1)?,
        price_min: decimal_column(row, 2)?,
        price_max: decimal_column(row, 3)?,
        price_sqm_min: decimal_column(row, 4)?,
        price_sqm_max: decimal_column(row, 5)?,
        rooms: rooms_from_json(filter_id, rooms),
        city: row.get(7)?,
        city_district: row.get(8)?,
        created_at: timestamp_column(row, 9)?,
    })
}

/// Stored room sets that no longer parse are reported as "no room filter".
fn rooms_from_json(filter_id: i64, raw: Option<String>) -> Option<Vec<i64>> {
    let raw = raw.filter(|s| !s.is_empty())?;
    match serde_json::from_str(&raw) {
        Ok(rooms) => Some(rooms),
        Err(e) => {
            warn!(filter_id, "Ignoring unreadable rooms value {:?}: {}", raw, e);
            None
        }
    }
}

pub fn insert(conn: &Connection, filter: &NewSavedFilter) -> Result<SavedFilter> {
    let rooms_json = filter.rooms.as_ref().map(serde_json::to_string).transpose()?;

    conn.execute(
        "INSERT INTO saved_filters (name, price_min, price_max, price_sqm_min, price_sqm_max,
             rooms, city, city_district, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            filter.name,
            decimal_to_sql(filter.price_min),
            decimal_to_sql(filter.price_max),
            decimal_to_sql(filter.price_sqm_min),
            decimal_to_sql(filter.price_sqm_max),
            rooms_json,
            filter.city,
            filter.city_district,
            timestamp_to_sql(Utc::now()),
        ],
    )?;

    let filter_id = conn.last_insert_rowid();
    get(conn, filter_id)?.ok_or(ListingError::NotFound {
        entity: "Filter",
        id: filter_id,
    })
}

pub fn get(conn: &Connection, filter_id: i64) -> Result<Option<SavedFilter>> {
    let filter = conn
        .query_row(
            &format!("SELECT {FILTER_COLUMNS} FROM saved_filters WHERE filter_id = ?1"),
            params![filter_id],
            saved_filter_from_row,
        )
        .optional()?;
    Ok(filter)
}

/// Newest first.
pub fn list(conn: &Connection, skip: i64, limit: i64) -> Result<Vec<SavedFilter>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FILTER_COLUMNS} FROM saved_filters
         ORDER BY created_at DESC, filter_id DESC LIMIT ?1 OFFSET ?2"
    ))?;
    let filters = stmt
        .query_map(params![limit, skip], saved_filter_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(filters)
}

pub fn count(conn: &Connection) -> Result<i64> {
    let total = conn.query_row("SELECT COUNT(*) FROM saved_filters", [], |row| row.get(0))?;
    Ok(total)
}
