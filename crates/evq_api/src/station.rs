use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use evq_core::Station;

use crate::app_state::AppState;
use crate::error::engine_error_to_response;

/// List every stored station document
pub async fn list_stations(State(app_state): State<AppState>) -> impl IntoResponse {
    tracing::info!("Listing stations");
    match app_state.engine.list_stations().await {
        Ok(stations) => Json(stations).into_response(),
        Err(error) => engine_error_to_response(error),
    }
}

/// Get a station, creating an empty one if it does not exist yet
pub async fn get_station(
    State(app_state): State<AppState>,
    Path(station_id): Path<String>,
) -> impl IntoResponse {
    tracing::info!("Getting station {}", station_id);
    match app_state.engine.station(&station_id).await {
        Ok(station) => Json(station).into_response(),
        Err(error) => engine_error_to_response(error),
    }
}

/// Replace the whole station document
pub async fn update_station(
    State(app_state): State<AppState>,
    Path(station_id): Path<String>,
    Json(payload): Json<Station>,
) -> impl IntoResponse {
    tracing::info!("Updating station {}", station_id);
    match app_state.engine.replace(&station_id, payload).await {
        Ok(station) => Json(station).into_response(),
        Err(error) => engine_error_to_response(error),
    }
}
