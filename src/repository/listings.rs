use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::locations::location_from_row;
use super::{date_column, date_to_sql, decimal_column, decimal_to_sql, decimal_value};
use crate::error::Result;
use crate::models::{DimensionIds, Listing, ListingArgs, ListingQuery, ListingWithLocation, PriceRange};

const LISTING_COLUMNS: &str = "listing_id, location_id, building_id, owner_id, features_id, \
     rooms, area, price_total_zl, price_sqm_zl, price_per_sqm_detailed, date_posted, \
     photo_count, url, image_url, description_text";

const LISTING_WITH_LOCATION_SELECT: &str = "SELECT l.listing_id, l.rooms, l.area, \
     l.price_total_zl, l.price_sqm_zl, l.price_per_sqm_detailed, l.date_posted, l.photo_count, \
     l.url, l.image_url, l.description_text, \
     loc.location_id, loc.city, loc.locality, loc.city_district, loc.street, loc.full_address, \
     loc.latitude, loc.longitude \
     FROM listing l JOIN location loc ON loc.location_id = l.location_id";

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<Listing> {
    Ok(Listing {
        listing_id: row.get(0)?,
        location_id: row.get(1)?,
        building_id: row.get(2)?,
        owner_id: row.get(3)?,
        features_id: row.get(4)?,
        rooms: row.get(5)?,
        area: decimal_column(row, 6)?,
        price_total_zl: decimal_column(row, 7)?,
        price_sqm_zl: decimal_column(row, 8)?,
        price_per_sqm_detailed: decimal_column(row, 9)?,
        date_posted: date_column(row, 10)?,
        photo_count: row.get(11)?,
        url: row.get(12)?,
        image_url: row.get(13)?,
        description_text: row.get(14)?,
    })
}

fn listing_with_location_from_row(row: &Row<'_>) -> rusqlite::Result<ListingWithLocation> {
    Ok(ListingWithLocation {
        listing_id: row.get(0)?,
        rooms: row.get(1)?,
        area: decimal_column(row, 2)?,
        price_total_zl: decimal_column(row, 3)?,
        price_sqm_zl: decimal_column(row, 4)?,
        price_per_sqm_detailed: decimal_column(row, 5)?,
        date_posted: date_column(row, 6)?,
        photo_count: row.get(7)?,
        url: row.get(8)?,
        image_url: row.get(9)?,
        description_text: row.get(10)?,
        location: location_from_row(row, 11)?,
    })
}

pub fn find_by_url(conn: &Connection, url: &str) -> Result<Option<Listing>> {
    let listing = conn
        .query_row(
            &format!("SELECT {LISTING_COLUMNS} FROM listing WHERE url = ?1"),
            params![url],
            listing_from_row,
        )
        .optional()?;
    Ok(listing)
}

pub fn insert(conn: &Connection, listing: &ListingArgs, dims: &DimensionIds) -> Result<i64> {
    conn.execute(
        "INSERT INTO listing (location_id, building_id, owner_id, features_id, rooms, area,
             price_total_zl, price_sqm_zl, price_per_sqm_detailed, date_posted, photo_count,
             url, image_url, description_text)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            dims.location_id,
            dims.building_id,
            dims.owner_id,
            dims.features_id,
            listing.rooms,
            decimal_to_sql(listing.area),
            decimal_to_sql(listing.price_total_zl),
            decimal_to_sql(listing.price_sqm_zl),
            decimal_to_sql(listing.price_per_sqm_detailed),
            date_to_sql(listing.date_posted),
            listing.photo_count,
            listing.url,
            listing.image_url,
            listing.description_text,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Refreshes every field of an existing listing in place. The URL is the
/// row's identity and is left untouched.
pub fn update(conn: &Connection, listing_id: i64, listing: &ListingArgs, dims: &DimensionIds) -> Result<()> {
    conn.execute(
        "UPDATE listing SET location_id = ?1, building_id = ?2, owner_id = ?3, features_id = ?4,
             rooms = ?5, area = ?6, price_total_zl = ?7, price_sqm_zl = ?8,
             price_per_sqm_detailed = ?9, date_posted = ?10, photo_count = ?11,
             image_url = ?12, description_text = ?13
         WHERE listing_id = ?14",
        params![
            dims.location_id,
            dims.building_id,
            dims.owner_id,
            dims.features_id,
            listing.rooms,
            decimal_to_sql(listing.area),
            decimal_to_sql(listing.price_total_zl),
            decimal_to_sql(listing.price_sqm_zl),
            decimal_to_sql(listing.price_per_sqm_detailed),
            date_to_sql(listing.date_posted),
            listing.photo_count,
            listing.image_url,
            listing.description_text,
            listing_id,
        ],
    )?;
    Ok(())
}

pub fn count(conn: &Connection) -> Result<i64> {
    let total = conn.query_row("SELECT COUNT(*) FROM listing", [], |row| row.get(0))?;
    Ok(total)
}

pub fn list_with_location(conn: &Connection, skip: i64, limit: i64) -> Result<Vec<ListingWithLocation>> {
    let mut stmt = conn.prepare(&format!(
        "{LISTING_WITH_LOCATION_SELECT} ORDER BY l.listing_id LIMIT ?1 OFFSET ?2"
    ))?;
    let listings = stmt
        .query_map(params![limit, skip], listing_with_location_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(listings)
}

pub fn get_with_location(conn: &Connection, listing_id: i64) -> Result<Option<ListingWithLocation>> {
    let listing = conn
        .query_row(
            &format!("{LISTING_WITH_LOCATION_SELECT} WHERE l.listing_id = ?1"),
            params![listing_id],
            listing_with_location_from_row,
        )
        .optional()?;
    Ok(listing)
}

/// Runs a listing search and returns the matches (ordered by id) with their count.
pub fn search(conn: &Connection, query: &ListingQuery) -> Result<(Vec<ListingWithLocation>, i64)> {
    let (where_clause, values) = build_where_clause(query);

    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM listing l JOIN location loc ON loc.location_id = l.location_id{where_clause}"
        ),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{LISTING_WITH_LOCATION_SELECT}{where_clause} ORDER BY l.listing_id"
    ))?;
    let listings = stmt
        .query_map(params_from_iter(values.iter()), listing_with_location_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok((listings, total))
}

/// Builds ` WHERE ...` (or an empty string) plus its positional parameters,
/// in the order the placeholders appear.
fn build_where_clause(query: &ListingQuery) -> (String, Vec<Value>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(range) = &query.price_total {
        conditions.extend(range_conditions("l.price_total_zl", range, &mut values));
    }

    if let Some(range) = query.price_per_sqm.filter(|r| !r.is_unbounded()) {
        let alternatives: Vec<String> = ["l.price_sqm_zl", "l.price_per_sqm_detailed"]
            .iter()
            .map(|column| {
                let mut parts = vec![format!("{column} IS NOT NULL")];
                parts.extend(range_conditions(column, &range, &mut values));
                format!("({})", parts.join(" AND "))
            })
            .collect();
        conditions.push(format!("({})", alternatives.join(" OR ")));
    }

    if !query.rooms.is_empty() {
        let placeholders = vec!["?"; query.rooms.len()].join(", ");
        conditions.push(format!("l.rooms IN ({placeholders})"));
        values.extend(query.rooms.iter().map(|r| Value::Integer(*r)));
    }

    if let Some(city) = non_blank(&query.city) {
        conditions.push("loc.city = ?".to_string());
        values.push(Value::Text(city));
    }

    if let Some(district) = non_blank(&query.city_district) {
        conditions.push("loc.city_district = ?".to_string());
        values.push(Value::Text(district));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn range_conditions(column: &str, range: &PriceRange, values: &mut Vec<Value>) -> Vec<String> {
    let mut parts = Vec::new();
    if let Some(min) = range.min {
        parts.push(format!("CAST({column} AS REAL) >= CAST(? AS REAL)"));
        values.push(decimal_value(Some(min)));
    }
    if let Some(max) = range.max {
        parts.push(format!("CAST({column} AS REAL) <= CAST(? AS REAL)"));
        values.push(decimal_value(Some(max)));
    }
    parts
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
