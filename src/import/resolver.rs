use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::models::{BuildingArgs, DimensionIds, FeaturesArgs, LocationArgs, OwnerArgs};
use crate::repository::{bool_value, decimal_value, integer_value, text_value};

use super::row::ListingRecord;

const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// A reference-data table whose rows are identified by their full field tuple.
pub trait Dimension {
    const TABLE: &'static str;
    const ID_COLUMN: &'static str;
    const COLUMNS: &'static [&'static str];

    /// Column values, in `COLUMNS` order.
    fn values(&self) -> Vec<Value>;
}

impl Dimension for LocationArgs {
    const TABLE: &'static str = "location";
    const ID_COLUMN: &'static str = "location_id";
    const COLUMNS: &'static [&'static str] = &[
        "city",
        "locality",
        "city_district",
        "street",
        "full_address",
        "latitude",
        "longitude",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            text_value(&self.city),
            text_value(&self.locality),
            text_value(&self.city_district),
            text_value(&self.street),
            text_value(&self.full_address),
            decimal_value(self.latitude),
            decimal_value(self.longitude),
        ]
    }
}

impl Dimension for BuildingArgs {
    const TABLE: &'static str = "building";
    const ID_COLUMN: &'static str = "building_id";
    const COLUMNS: &'static [&'static str] = &["year_built", "building_type", "floor"];

    fn values(&self) -> Vec<Value> {
        vec![
            integer_value(self.year_built),
            text_value(&self.building_type),
            integer_value(self.floor),
        ]
    }
}

impl Dimension for OwnerArgs {
    const TABLE: &'static str = "owner";
    const ID_COLUMN: &'static str = "owner_id";
    const COLUMNS: &'static [&'static str] = &["owner_type", "contact_name", "contact_phone", "contact_email"];

    fn values(&self) -> Vec<Value> {
        vec![
            text_value(&self.owner_type),
            text_value(&self.contact_name),
            text_value(&self.contact_phone),
            text_value(&self.contact_email),
        ]
    }
}

impl Dimension for FeaturesArgs {
    const TABLE: &'static str = "features";
    const ID_COLUMN: &'static str = "features_id";
    const COLUMNS: &'static [&'static str] = &[
        "has_basement",
        "has_parking",
        "kitchen_type",
        "window_type",
        "ownership_type",
        "equipment",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            bool_value(self.has_basement),
            bool_value(self.has_parking),
            text_value(&self.kitchen_type),
            text_value(&self.window_type),
            text_value(&self.ownership_type),
            text_value(&self.equipment),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: i64,
    pub created: bool,
}

/// Dimension rows inserted while resolving, per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DimensionCounts {
    pub locations: usize,
    pub buildings: usize,
    pub owners: usize,
    pub features: usize,
}

impl DimensionCounts {
    pub fn total(&self) -> usize {
        self.locations + self.buildings + self.owners + self.features
    }

    pub fn add(&mut self, other: &DimensionCounts) {
        self.locations += other.locations;
        self.buildings += other.buildings;
        self.owners += other.owners;
        self.features += other.features;
    }
}

pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == SQLITE_CONSTRAINT_UNIQUE)
}

/// Absent fields match absent fields, mirroring the table's unique index.
fn find_existing<D: Dimension>(conn: &Connection, values: &[Value]) -> Result<Option<i64>> {
    let predicate = D::COLUMNS
        .iter()
        .enumerate()
        .map(|(i, column)| format!("IFNULL({column}, '') = IFNULL(?{}, '')", i + 1))
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql = format!("SELECT {} FROM {} WHERE {} LIMIT 1", D::ID_COLUMN, D::TABLE, predicate);

    let id = conn
        .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
        .optional()?;
    Ok(id)
}

/// Returns the id of the row matching `dimension`, inserting it first if no
/// such row exists yet.
pub fn get_or_create<D: Dimension>(conn: &Connection, dimension: &D) -> Result<Resolved> {
    let values = dimension.values();
    if let Some(id) = find_existing::<D>(conn, &values)? {
        return Ok(Resolved { id, created: false });
    }

    let placeholders = (1..=D::COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        D::TABLE,
        D::COLUMNS.join(", "),
        placeholders
    );

    match conn.execute(&sql, params_from_iter(values.iter())) {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            debug!(table = D::TABLE, id, "Created dimension row");
            Ok(Resolved { id, created: true })
        }
        Err(e) if is_unique_violation(&e) => {
            debug!(table = D::TABLE, "Dimension row appeared concurrently, re-fetching");
            match find_existing::<D>(conn, &values)? {
                Some(id) => Ok(Resolved { id, created: false }),
                None => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolves all four dimensions of a row, counting the ones it had to create.
#[instrument(skip_all, fields(url = %record.listing.url))]
pub fn resolve_dimensions(
    conn: &Connection,
    record: &ListingRecord,
    counts: &mut DimensionCounts,
) -> Result<DimensionIds> {
    let location = get_or_create(conn, &record.location)?;
    let building = get_or_create(conn, &record.building)?;
    let owner = get_or_create(conn, &record.owner)?;
    let features = get_or_create(conn, &record.features)?;

    counts.locations += usize::from(location.created);
    counts.buildings += usize::from(building.created);
    counts.owners += usize::from(owner.created);
    counts.features += usize::from(features.created);

    Ok(DimensionIds {
        location_id: location.id,
        building_id: building.id,
        owner_id: owner.id,
        features_id: features.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn warsaw() -> LocationArgs {
        LocationArgs {
            city: Some("Warszawa".to_string()),
            city_district: Some("Mokotów".to_string()),
            latitude: Some(Decimal::from_str("52.193").unwrap()),
            ..Default::default()
        }
    }

    fn row_count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_identical_tuples_resolve_to_same_id() {
        let conn = db::open_in_memory().unwrap();
        let first = get_or_create(&conn, &warsaw()).unwrap();
        let second = get_or_create(&conn, &warsaw()).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(row_count(&conn, "location"), 1);
    }

    #[test]
    fn test_absent_is_distinct_from_present() {
        let conn = db::open_in_memory().unwrap();
        let with_district = get_or_create(&conn, &warsaw()).unwrap();
        let without_district = get_or_create(
            &conn,
            &LocationArgs {
                city_district: None,
                ..warsaw()
            },
        )
        .unwrap();

        assert_ne!(with_district.id, without_district.id);
        assert_eq!(row_count(&conn, "location"), 2);
    }

    #[test]
    fn test_all_absent_tuple_is_shared() {
        let conn = db::open_in_memory().unwrap();
        let a = get_or_create(&conn, &OwnerArgs::default()).unwrap();
        let b = get_or_create(&conn, &OwnerArgs::default()).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(row_count(&conn, "owner"), 1);
    }

    #[test]
    fn test_equal_decimals_with_different_scale_match() {
        let conn = db::open_in_memory().unwrap();
        let a = get_or_create(&conn, &warsaw()).unwrap();
        let b = get_or_create(
            &conn,
            &LocationArgs {
                latitude: Some(Decimal::from_str("52.19300").unwrap()),
                ..warsaw()
            },
        )
        .unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_unique_index_rejects_duplicate_tuple() {
        let conn = db::open_in_memory().unwrap();
        let features = FeaturesArgs {
            has_parking: Some(true),
            ..Default::default()
        };
        get_or_create(&conn, &features).unwrap();

        let err = conn
            .execute("INSERT INTO features (has_parking) VALUES (1)", [])
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_boolean_tri_state_is_part_of_identity() {
        let conn = db::open_in_memory().unwrap();
        let unknown = get_or_create(&conn, &FeaturesArgs::default()).unwrap();
        let no = get_or_create(
            &conn,
            &FeaturesArgs {
                has_parking: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert_ne!(unknown.id, no.id);
    }
}
