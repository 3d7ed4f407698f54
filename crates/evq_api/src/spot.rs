use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use evq_core::{
    ChargingRequest, QueueError, RequestStatus, SIMULATED_SECOND, Station, format_minutes,
};
use evq_engine::EngineError;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::engine_error_to_response;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitRequest {
    pub spot_id: String,
    pub requested_minutes: f64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitResponse {
    pub request: ChargingRequest,
    pub station: Station,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickRequest {
    #[serde(default = "default_elapsed")]
    pub elapsed_minutes: f64,
}

fn default_elapsed() -> f64 {
    SIMULATED_SECOND
}

/// What a driver sees for their spot.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotStatus {
    pub spot_id: String,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_wait_minutes: Option<f64>,
    pub message: String,
    /// Last persistence failure, shown as a banner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SpotStatus {
    fn new(request: &ChargingRequest, warning: Option<String>) -> Self {
        let (queue_position, remaining_minutes, total_wait_minutes, message) = match request.status
        {
            RequestStatus::Waiting => {
                let wait = request.total_wait_minutes.unwrap_or(0.0);
                (
                    Some(request.queue_position),
                    None,
                    Some(wait),
                    format!(
                        "Position {} in queue, about {} until charging",
                        request.queue_position,
                        format_minutes(wait)
                    ),
                )
            }
            RequestStatus::Charging => {
                let remaining = request.occupied_minutes();
                (
                    None,
                    Some(remaining),
                    None,
                    format!("Charging, {} remaining", format_minutes(remaining)),
                )
            }
            RequestStatus::Completed => (
                None,
                Some(0.0),
                None,
                "Charging complete, please confirm departure".to_string(),
            ),
        };

        SpotStatus {
            spot_id: request.spot_id.clone(),
            status: request.status,
            queue_position,
            remaining_minutes,
            total_wait_minutes,
            message,
            warning,
        }
    }
}

/// Admit a spot to the station queue
pub async fn admit_spot(
    State(app_state): State<AppState>,
    Path(station_id): Path<String>,
    Json(payload): Json<AdmitRequest>,
) -> impl IntoResponse {
    match app_state
        .engine
        .admit(&station_id, &payload.spot_id, payload.requested_minutes)
        .await
    {
        Ok((station, request)) => {
            (StatusCode::OK, Json(AdmitResponse { request, station })).into_response()
        }
        Err(error) => engine_error_to_response(error),
    }
}

/// The driver confirmed leaving the spot
pub async fn depart_spot(
    State(app_state): State<AppState>,
    Path((station_id, spot_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match app_state.engine.depart(&station_id, &spot_id).await {
        Ok(station) => Json(station).into_response(),
        Err(error) => engine_error_to_response(error),
    }
}

/// Status of a single spot's request
pub async fn spot_status(
    State(app_state): State<AppState>,
    Path((station_id, spot_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let station = match app_state.engine.station(&station_id).await {
        Ok(station) => station,
        Err(error) => return engine_error_to_response(error),
    };
    match station.find(&spot_id) {
        Some(request) => Json(SpotStatus::new(
            request,
            app_state.engine.persistence_warning(),
        ))
        .into_response(),
        None => engine_error_to_response(EngineError::Queue(QueueError::RequestNotFound {
            spot_id,
        })),
    }
}

/// Advance one station by hand
pub async fn tick_station(
    State(app_state): State<AppState>,
    Path(station_id): Path<String>,
    Json(payload): Json<TickRequest>,
) -> impl IntoResponse {
    match app_state
        .engine
        .tick(&station_id, payload.elapsed_minutes)
        .await
    {
        Ok(outcome) => Json(outcome.station).into_response(),
        Err(error) => engine_error_to_response(error),
    }
}
