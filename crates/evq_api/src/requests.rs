use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use evq_core::RequestRecord;

use crate::app_state::AppState;
use crate::error::{engine_error_to_response, error_response};

pub async fn list_requests(State(app_state): State<AppState>) -> impl IntoResponse {
    match app_state.engine.list_requests().await {
        Ok(records) => Json(records).into_response(),
        Err(error) => engine_error_to_response(error),
    }
}

pub async fn create_request(
    State(app_state): State<AppState>,
    Json(payload): Json<RequestRecord>,
) -> impl IntoResponse {
    match app_state.engine.create_request(payload).await {
        Ok(record) => Json(record).into_response(),
        Err(error) => engine_error_to_response(error),
    }
}

pub async fn update_request(
    State(app_state): State<AppState>,
    Path(request_id): Path<String>,
    Json(payload): Json<RequestRecord>,
) -> impl IntoResponse {
    match app_state.engine.update_request(&request_id, payload).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Request {} not found", request_id),
        ),
        Err(error) => engine_error_to_response(error),
    }
}

pub async fn station_requests(
    State(app_state): State<AppState>,
    Path(station_id): Path<String>,
) -> impl IntoResponse {
    match app_state.engine.requests_for_station(&station_id).await {
        Ok(records) => Json(records).into_response(),
        Err(error) => engine_error_to_response(error),
    }
}
