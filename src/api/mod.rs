//! HTTP API over the listings store.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod state;

use axum::http::Method;
use axum::routing::{get, post};
use axum::{Router, ServiceExt};
use hyper::Server;
use std::net::SocketAddr;
use tower::{Layer, ServiceBuilder};
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{ListingError, Result};

pub use state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/locations", get(handlers::list_locations))
        .route("/locations/:location_id", get(handlers::get_location))
        .route("/listings", get(handlers::list_listings))
        .route("/listings/:listing_id", get(handlers::get_listing))
        .route("/filters", get(handlers::list_filters).post(handlers::save_filter))
        .route("/filters/search", post(handlers::search_listings))
        .route("/filters/:filter_id", get(handlers::get_filter))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// The router behind trailing-slash normalization, so `/health/` and `/health` both resolve.
pub fn create_app(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(create_router(state))
}

pub async fn start_server(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| ListingError::Config(format!("Invalid listen address '{host}:{port}': {e}")))?;

    let app = create_app(state);

    info!("Listings API listening on http://{}", addr);
    info!("Health check available at http://{}/health", addr);

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
