use rusqlite::{params, Connection, OptionalExtension, Row};

use super::decimal_column;
use crate::error::Result;
use crate::models::Location;

pub(crate) const LOCATION_COLUMNS: &str =
    "location_id, city, locality, city_district, street, full_address, latitude, longitude";

/// Maps the eight location columns starting at `offset`.
pub(crate) fn location_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Location> {
    Ok(Location {
        location_id: row.get(offset)?,
        city: row.get(offset + 1)?,
        locality: row.get(offset + 2)?,
        city_district: row.get(offset + 3)?,
        street: row.get(offset + 4)?,
        full_address: row.get(offset + 5)?,
        latitude: decimal_column(row, offset + 6)?,
        longitude: decimal_column(row, offset + 7)?,
    })
}

pub fn count(conn: &Connection) -> Result<i64> {
    let total = conn.query_row("SELECT COUNT(*) FROM location", [], |row| row.get(0))?;
    Ok(total)
}

pub fn list(conn: &Connection, skip: i64, limit: i64) -> Result<Vec<Location>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LOCATION_COLUMNS} FROM location ORDER BY location_id LIMIT ?1 OFFSET ?2"
    ))?;
    let locations = stmt
        .query_map(params![limit, skip], |row| location_from_row(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(locations)
}

pub fn get(conn: &Connection, location_id: i64) -> Result<Option<Location>> {
    let location = conn
        .query_row(
            &format!("SELECT {LOCATION_COLUMNS} FROM location WHERE location_id = ?1"),
            params![location_id],
            |row| location_from_row(row, 0),
        )
        .optional()?;
    Ok(location)
}
