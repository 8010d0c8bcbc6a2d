use csv::StringRecord;
use serde::Deserialize;
use std::collections::HashSet;
use url::Url;

use super::normalize::FieldCleaner;
use super::RowError;
use crate::error::ListingError;
use crate::models::{BuildingArgs, FeaturesArgs, ListingArgs, LocationArgs, OwnerArgs};

/// Short header names accepted for the long column names.
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("description", "description_text"),
    ("price", "price_total_zl"),
    ("district", "city_district"),
    ("address", "full_address"),
];

const COLUMNS: &[&str] = &[
    "url", "image_url", "description_text", "rooms", "area", "price_total_zl", "price_sqm_zl",
    "price_per_sqm_detailed", "date_posted", "photo_count", "city", "locality", "city_district",
    "street", "full_address", "latitude", "longitude", "year_built", "building_type", "floor",
    "owner_type", "contact_name", "contact_phone", "contact_email", "has_basement", "has_parking",
    "kitchen_type", "window_type", "ownership_type", "equipment",
];

/// Lowercases header names and resolves aliases to column names. Fails when
/// two headers land on the same column.
pub fn canonical_header(header: &StringRecord) -> Result<StringRecord, ListingError> {
    let mut seen = HashSet::new();
    let mut canonical = StringRecord::with_capacity(header.as_slice().len(), header.len());
    for name in header {
        let lowered = name.trim().to_lowercase();
        let column = COLUMN_ALIASES
            .iter()
            .find(|(alias, _)| *alias == lowered)
            .map_or(lowered.as_str(), |(_, column)| *column);
        if COLUMNS.contains(&column) && !seen.insert(column.to_string()) {
            return Err(ListingError::Validation(format!(
                "CSV header maps more than one column to '{column}'"
            )));
        }
        canonical.push_field(column);
    }
    Ok(canonical)
}

/// One CSV record as read from the file. Columns missing from the header
/// deserialize as `None`; the header must pass through [`canonical_header`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListingRow {
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub description_text: Option<String>,
    pub rooms: Option<String>,
    pub area: Option<String>,
    pub price_total_zl: Option<String>,
    pub price_sqm_zl: Option<String>,
    pub price_per_sqm_detailed: Option<String>,
    pub date_posted: Option<String>,
    pub photo_count: Option<String>,

    pub city: Option<String>,
    pub locality: Option<String>,
    pub city_district: Option<String>,
    pub street: Option<String>,
    pub full_address: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,

    pub year_built: Option<String>,
    pub building_type: Option<String>,
    pub floor: Option<String>,

    pub owner_type: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,

    pub has_basement: Option<String>,
    pub has_parking: Option<String>,
    pub kitchen_type: Option<String>,
    pub window_type: Option<String>,
    pub ownership_type: Option<String>,
    pub equipment: Option<String>,
}

/// A fully normalized row, split into the listing and its four dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub listing: ListingArgs,
    pub location: LocationArgs,
    pub building: BuildingArgs,
    pub owner: OwnerArgs,
    pub features: FeaturesArgs,
}

impl RawListingRow {
    /// Normalizes every column. Only the URL can reject the row; any other
    /// malformed token is recorded on `cleaner` and stored as absent.
    pub fn normalize(&self, cleaner: &mut FieldCleaner) -> Result<ListingRecord, RowError> {
        let url = cleaner
            .text(self.url.as_deref())
            .ok_or(RowError::MissingRequiredField("url"))?;
        validate_url(&url)?;

        let listing = ListingArgs {
            url,
            rooms: cleaner.integer("rooms", self.rooms.as_deref()),
            area: cleaner.decimal("area", self.area.as_deref()),
            price_total_zl: cleaner.decimal("price_total_zl", self.price_total_zl.as_deref()),
            price_sqm_zl: cleaner.decimal("price_sqm_zl", self.price_sqm_zl.as_deref()),
            price_per_sqm_detailed: cleaner
                .decimal("price_per_sqm_detailed", self.price_per_sqm_detailed.as_deref()),
            date_posted: cleaner.date("date_posted", self.date_posted.as_deref()),
            photo_count: cleaner.integer("photo_count", self.photo_count.as_deref()),
            image_url: cleaner.text(self.image_url.as_deref()),
            description_text: cleaner.text(self.description_text.as_deref()),
        };

        let location = LocationArgs {
            city: cleaner.text(self.city.as_deref()),
            locality: cleaner.text(self.locality.as_deref()),
            city_district: cleaner.text(self.city_district.as_deref()),
            street: cleaner.text(self.street.as_deref()),
            full_address: cleaner.text(self.full_address.as_deref()),
            latitude: cleaner.decimal("latitude", self.latitude.as_deref()),
            longitude: cleaner.decimal("longitude", self.longitude.as_deref()),
        };

        let building = BuildingArgs {
            year_built: cleaner.integer("year_built", self.year_built.as_deref()),
            building_type: cleaner.text(self.building_type.as_deref()),
            floor: cleaner.integer("floor", self.floor.as_deref()),
        };

        let owner = OwnerArgs {
            owner_type: cleaner.text(self.owner_type.as_deref()),
            contact_name: cleaner.text(self.contact_name.as_deref()),
            contact_phone: cleaner.text(self.contact_phone.as_deref()),
            contact_email: cleaner.text(self.contact_email.as_deref()),
        };

        let features = FeaturesArgs {
            has_basement: cleaner.boolean("has_basement", self.has_basement.as_deref()),
            has_parking: cleaner.boolean("has_parking", self.has_parking.as_deref()),
            kitchen_type: cleaner.text(self.kitchen_type.as_deref()),
            window_type: cleaner.text(self.window_type.as_deref()),
            ownership_type: cleaner.text(self.ownership_type.as_deref()),
            equipment: cleaner.text(self.equipment.as_deref()),
        };

        Ok(ListingRecord {
            listing,
            location,
            building,
            owner,
            features,
        })
    }
}

fn validate_url(url: &str) -> Result<(), RowError> {
    let invalid = || RowError::InvalidRequiredField {
        column: "url",
        value: url.to_string(),
    };
    let parsed = Url::parse(url).map_err(|_| invalid())?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn row(url: &str) -> RawListingRow {
        RawListingRow {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_url_rejects_row() {
        let mut cleaner = FieldCleaner::new();
        let err = row("   ").normalize(&mut cleaner).unwrap_err();
        assert!(matches!(err, RowError::MissingRequiredField("url")));

        let err = RawListingRow::default().normalize(&mut cleaner).unwrap_err();
        assert!(matches!(err, RowError::MissingRequiredField("url")));
    }

    #[test]
    fn test_non_http_url_rejects_row() {
        let mut cleaner = FieldCleaner::new();
        for url in ["not a url", "ftp://example.com/1", "/relative/path"] {
            let err = row(url).normalize(&mut cleaner).unwrap_err();
            assert!(matches!(err, RowError::InvalidRequiredField { column: "url", .. }), "url {url}");
        }
    }

    #[test]
    fn test_malformed_optional_fields_become_absent() {
        let raw = RawListingRow {
            price_total_zl: Some("abc".to_string()),
            rooms: Some("2".to_string()),
            has_parking: Some("tak".to_string()),
            city: Some(" Kraków ".to_string()),
            ..row("http://x/1")
        };
        let mut cleaner = FieldCleaner::new();
        let record = raw.normalize(&mut cleaner).unwrap();

        assert_eq!(record.listing.url, "http://x/1");
        assert_eq!(record.listing.price_total_zl, None);
        assert_eq!(record.listing.rooms, Some(2));
        assert_eq!(record.features.has_parking, Some(true));
        assert_eq!(record.features.has_basement, None);
        assert_eq!(record.location.city.as_deref(), Some("Kraków"));
        assert_eq!(cleaner.malformed().len(), 1);
    }

    #[test]
    fn test_prices_are_parsed() {
        let raw = RawListingRow {
            price_total_zl: Some("300 000 zł".to_string()),
            price_sqm_zl: Some("6 122,45".to_string()),
            ..row("https://example.com/offer/1")
        };
        let record = raw.normalize(&mut FieldCleaner::new()).unwrap();
        assert_eq!(record.listing.price_total_zl, Some(Decimal::from(300_000)));
        assert_eq!(record.listing.price_sqm_zl, Some(Decimal::new(612245, 2)));
    }

    #[test]
    fn test_header_is_case_insensitive_and_resolves_aliases() {
        let header = StringRecord::from(vec!["URL", " Price ", "District", "notes"]);
        let canonical = canonical_header(&header).unwrap();
        assert_eq!(canonical, StringRecord::from(vec!["url", "price_total_zl", "city_district", "notes"]));

        let record = StringRecord::from(vec!["https://example.com/offer/1", "300 000", "Wola", "x"]);
        let raw: RawListingRow = record.deserialize(Some(&canonical)).unwrap();
        assert_eq!(raw.url.as_deref(), Some("https://example.com/offer/1"));
        assert_eq!(raw.city_district.as_deref(), Some("Wola"));
    }

    #[test]
    fn test_header_rejects_column_and_alias_together() {
        let header = StringRecord::from(vec!["url", "price", "price_total_zl"]);
        let err = canonical_header(&header).unwrap_err();
        assert!(matches!(err, ListingError::Validation(_)));

        let header = StringRecord::from(vec!["url", "URL"]);
        assert!(canonical_header(&header).is_err());

        let header = StringRecord::from(vec!["url", "notes", "notes"]);
        assert!(canonical_header(&header).is_ok());
    }
}
