use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use tracing::{error, info};

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::models::{
    FilterRequest, FilteredListingsResponse, HealthResponse, HealthStatus, ListingListResponse,
    LocationListResponse, PaginationParams, SaveFilterRequest, SavedFilterListResponse, SearchParams,
};
use super::state::AppState;
use crate::db;
use crate::error::ListingError;
use crate::models::{ListingWithLocation, Location, SavedFilter};
use crate::repository::{filters, listings, locations};
use crate::sorting::{OfferSorter, SortOrder, SortType};

/// Health check endpoint. Always answers 200; a failing store is reported in the body.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match state.with_connection(db::ping) {
        Ok(()) => (HealthStatus::Healthy, "connected".to_string()),
        Err(e) => {
            error!("Health check failed: {}", e);
            (HealthStatus::Unhealthy, format!("error: {e}"))
        }
    };

    Json(HealthResponse {
        status,
        timestamp: Utc::now(),
        database,
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn list_locations(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<Json<LocationListResponse>, ApiError> {
    let page = params.validate()?;
    let (locations, total) = state.with_connection(|conn| {
        Ok((locations::list(conn, page.skip, page.limit)?, locations::count(conn)?))
    })?;

    Ok(Json(LocationListResponse {
        locations,
        total,
        skip: page.skip,
        limit: page.limit,
    }))
}

pub async fn get_location(
    State(state): State<AppState>,
    ApiPath(location_id): ApiPath<i64>,
) -> Result<Json<Location>, ApiError> {
    let location = state.with_connection(|conn| {
        locations::get(conn, location_id)?.ok_or(ListingError::NotFound {
            entity: "Location",
            id: location_id,
        })
    })?;
    Ok(Json(location))
}

pub async fn list_listings(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<Json<ListingListResponse>, ApiError> {
    let page = params.validate()?;
    let (listings, total) = state.with_connection(|conn| {
        Ok((
            listings::list_with_location(conn, page.skip, page.limit)?,
            listings::count(conn)?,
        ))
    })?;

    Ok(Json(ListingListResponse {
        listings,
        total,
        skip: page.skip,
        limit: page.limit,
    }))
}

pub async fn get_listing(
    State(state): State<AppState>,
    ApiPath(listing_id): ApiPath<i64>,
) -> Result<Json<ListingWithLocation>, ApiError> {
    let listing = state.with_connection(|conn| {
        listings::get_with_location(conn, listing_id)?.ok_or(ListingError::NotFound {
            entity: "Listing",
            id: listing_id,
        })
    })?;
    Ok(Json(listing))
}

pub async fn save_filter(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SaveFilterRequest>,
) -> Result<(StatusCode, Json<SavedFilter>), ApiError> {
    request.validate()?;
    let new_filter = request.into_new_filter();
    let saved = state.with_connection(|conn| filters::insert(conn, &new_filter))?;

    info!("Saved filter {} ({})", saved.name, saved.filter_id);
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn list_filters(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<Json<SavedFilterListResponse>, ApiError> {
    let page = params.validate()?;
    let (filters, total) = state.with_connection(|conn| {
        Ok((filters::list(conn, page.skip, page.limit)?, filters::count(conn)?))
    })?;
    Ok(Json(SavedFilterListResponse { filters, total }))
}

pub async fn get_filter(
    State(state): State<AppState>,
    ApiPath(filter_id): ApiPath<i64>,
) -> Result<Json<SavedFilter>, ApiError> {
    let filter = state.with_connection(|conn| {
        filters::get(conn, filter_id)?.ok_or(ListingError::NotFound {
            entity: "Filter",
            id: filter_id,
        })
    })?;
    Ok(Json(filter))
}

/// Filters listings, then optionally reorders them with `sort_by` / `order`.
pub async fn search_listings(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
    ApiJson(request): ApiJson<FilterRequest>,
) -> Result<Json<FilteredListingsResponse>, ApiError> {
    request.validate()?;
    let query = request.into_query();
    let (listings, total) = state.with_connection(|conn| listings::search(conn, &query))?;

    let sort_by = params.sort_by.as_deref().and_then(SortType::parse);
    let order = SortOrder::parse(params.order.as_deref());
    let listings = OfferSorter::sort(&listings, sort_by, order);

    Ok(Json(FilteredListingsResponse { listings, total }))
}
