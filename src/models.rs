use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Dimension entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub location_id: i64,
    pub city: Option<String>,
    pub locality: Option<String>,
    pub city_district: Option<String>,
    pub street: Option<String>,
    pub full_address: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
}

/// Natural key of a [`Location`]: the full field tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LocationArgs {
    pub city: Option<String>,
    pub locality: Option<String>,
    pub city_district: Option<String>,
    pub street: Option<String>,
    pub full_address: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BuildingArgs {
    pub year_built: Option<i64>,
    pub building_type: Option<String>,
    pub floor: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct OwnerArgs {
    pub owner_type: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FeaturesArgs {
    pub has_basement: Option<bool>,
    pub has_parking: Option<bool>,
    pub kitchen_type: Option<String>,
    pub window_type: Option<String>,
    pub ownership_type: Option<String>,
    pub equipment: Option<String>,
}

// ============================================================================
// Listings
// ============================================================================

/// Resolved ids of the four dimension rows a listing points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionIds {
    pub location_id: i64,
    pub building_id: i64,
    pub owner_id: i64,
    pub features_id: i64,
}

/// Listing-owned fields of an incoming row, keyed by `url`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingArgs {
    pub url: String,
    pub rooms: Option<i64>,
    pub area: Option<Decimal>,
    pub price_total_zl: Option<Decimal>,
    pub price_sqm_zl: Option<Decimal>,
    pub price_per_sqm_detailed: Option<Decimal>,
    pub date_posted: Option<NaiveDate>,
    pub photo_count: Option<i64>,
    pub image_url: Option<String>,
    pub description_text: Option<String>,
}

/// A persisted listing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub listing_id: i64,
    pub location_id: i64,
    pub building_id: i64,
    pub owner_id: i64,
    pub features_id: i64,
    pub rooms: Option<i64>,
    pub area: Option<Decimal>,
    pub price_total_zl: Option<Decimal>,
    pub price_sqm_zl: Option<Decimal>,
    pub price_per_sqm_detailed: Option<Decimal>,
    pub date_posted: Option<NaiveDate>,
    pub photo_count: Option<i64>,
    pub url: String,
    pub image_url: Option<String>,
    pub description_text: Option<String>,
}

impl Listing {
    pub fn dimension_ids(&self) -> DimensionIds {
        DimensionIds {
            location_id: self.location_id,
            building_id: self.building_id,
            owner_id: self.owner_id,
            features_id: self.features_id,
        }
    }
}

/// Listing as served by the API, with its location embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingWithLocation {
    pub listing_id: i64,
    pub rooms: Option<i64>,
    pub area: Option<Decimal>,
    pub price_total_zl: Option<Decimal>,
    pub price_sqm_zl: Option<Decimal>,
    pub price_per_sqm_detailed: Option<Decimal>,
    pub date_posted: Option<NaiveDate>,
    pub photo_count: Option<i64>,
    pub url: String,
    pub image_url: Option<String>,
    pub description_text: Option<String>,
    pub location: Location,
}

// ============================================================================
// Search and saved filters
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(default)]
    pub min: Option<Decimal>,
    #[serde(default)]
    pub max: Option<Decimal>,
}

impl PriceRange {
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Conditions for a listing search. Every populated condition must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingQuery {
    pub price_total: Option<PriceRange>,
    pub price_per_sqm: Option<PriceRange>,
    pub rooms: Vec<i64>,
    pub city: Option<String>,
    pub city_district: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFilter {
    pub filter_id: i64,
    pub name: String,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub price_sqm_min: Option<Decimal>,
    pub price_sqm_max: Option<Decimal>,
    pub rooms: Option<Vec<i64>>,
    pub city: Option<String>,
    pub city_district: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSavedFilter {
    pub name: String,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub price_sqm_min: Option<Decimal>,
    pub price_sqm_max: Option<Decimal>,
    pub rooms: Option<Vec<i64>>,
    pub city: Option<String>,
    pub city_district: Option<String>,
}
