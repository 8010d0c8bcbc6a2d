use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::models::{ListingQuery, ListingWithLocation, Location, NewSavedFilter, PriceRange, SavedFilter};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 100;
const MAX_TEXT_LEN: usize = 255;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: i64,
    pub limit: i64,
}

impl PaginationParams {
    pub fn validate(&self) -> Result<Pagination, ApiError> {
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if skip < 0 {
            return Err(ApiError::unprocessable("skip must be greater than or equal to 0"));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::unprocessable(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(Pagination { skip, limit })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// Body of `POST /filters`.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveFilterRequest {
    pub name: String,
    pub price_total: Option<PriceRange>,
    pub price_per_sqm: Option<PriceRange>,
    pub rooms: Option<Vec<i64>>,
    pub city: Option<String>,
    pub city_district: Option<String>,
}

impl SaveFilterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let name_len = self.name.chars().count();
        if name_len == 0 || name_len > MAX_TEXT_LEN {
            return Err(ApiError::unprocessable(format!(
                "name must be between 1 and {MAX_TEXT_LEN} characters"
            )));
        }
        validate_criteria(
            self.price_total.as_ref(),
            self.price_per_sqm.as_ref(),
            self.rooms.as_deref(),
            self.city.as_deref(),
            self.city_district.as_deref(),
        )
    }

    pub fn into_new_filter(self) -> NewSavedFilter {
        let price_total = self.price_total.unwrap_or_default();
        let price_per_sqm = self.price_per_sqm.unwrap_or_default();
        NewSavedFilter {
            name: self.name,
            price_min: price_total.min,
            price_max: price_total.max,
            price_sqm_min: price_per_sqm.min,
            price_sqm_max: price_per_sqm.max,
            rooms: self.rooms,
            city: self.city,
            city_district: self.city_district,
        }
    }
}

/// Body of `POST /filters/search`. `name` is accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterRequest {
    pub name: Option<String>,
    pub price_total: Option<PriceRange>,
    pub price_per_sqm: Option<PriceRange>,
    pub rooms: Option<Vec<i64>>,
    pub city: Option<String>,
    pub city_district: Option<String>,
}

impl FilterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            if name.chars().count() > MAX_TEXT_LEN {
                return Err(ApiError::unprocessable(format!(
                    "name must be at most {MAX_TEXT_LEN} characters"
                )));
            }
        }
        validate_criteria(
            self.price_total.as_ref(),
            self.price_per_sqm.as_ref(),
            self.rooms.as_deref(),
            self.city.as_deref(),
            self.city_district.as_deref(),
        )
    }

    pub fn into_query(self) -> ListingQuery {
        ListingQuery {
            price_total: self.price_total,
            price_per_sqm: self.price_per_sqm,
            rooms: self.rooms.unwrap_or_default(),
            city: self.city,
            city_district: self.city_district,
        }
    }
}

fn validate_criteria(
    price_total: Option<&PriceRange>,
    price_per_sqm: Option<&PriceRange>,
    rooms: Option<&[i64]>,
    city: Option<&str>,
    city_district: Option<&str>,
) -> Result<(), ApiError> {
    for (field, range) in [("price_total", price_total), ("price_per_sqm", price_per_sqm)] {
        if let Some(PriceRange {
            min: Some(min),
            max: Some(max),
        }) = range
        {
            if min > max {
                return Err(ApiError::unprocessable(format!(
                    "{field}.min must not be greater than {field}.max"
                )));
            }
        }
    }

    if rooms.unwrap_or_default().iter().any(|room| *room < 1) {
        return Err(ApiError::unprocessable("Room count must be at least 1"));
    }

    for (field, value) in [("city", city), ("city_district", city_district)] {
        if value.is_some_and(|v| v.chars().count() > MAX_TEXT_LEN) {
            return Err(ApiError::unprocessable(format!(
                "{field} must be at most {MAX_TEXT_LEN} characters"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub database: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationListResponse {
    pub locations: Vec<Location>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingListResponse {
    pub listings: Vec<ListingWithLocation>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedFilterListResponse {
    pub filters: Vec<SavedFilter>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredListingsResponse {
    pub listings: Vec<ListingWithLocation>,
    pub total: i64,
}
