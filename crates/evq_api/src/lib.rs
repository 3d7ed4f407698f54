//! EVQ API Library
//!
//! HTTP API for the EV charging spot queue.

pub mod app_state;
pub mod config;
mod error;
pub mod logging;
mod requests;
mod spot;
mod station;

pub use crate::app_state::AppState;
pub use crate::error::ErrorResponse;
pub use crate::spot::{AdmitRequest, AdmitResponse, SpotStatus, TickRequest};

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Station and request routes, served both at the root and under `/api`.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stations", get(station::list_stations))
        .route(
            "/stations/{station_id}",
            get(station::get_station).put(station::update_station),
        )
        .route("/stations/{station_id}/admissions", post(spot::admit_spot))
        .route("/stations/{station_id}/tick", post(spot::tick_station))
        .route(
            "/stations/{station_id}/spots/{spot_id}",
            get(spot::spot_status).delete(spot::depart_spot),
        )
        .route(
            "/stations/{station_id}/requests",
            get(requests::station_requests),
        )
        .route(
            "/requests",
            get(requests::list_requests).post(requests::create_request),
        )
        .route("/requests/{request_id}", put(requests::update_request))
}

/// Create the application router with all endpoints
pub fn create_app(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
