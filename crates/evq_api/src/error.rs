use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use evq_core::QueueError;
use evq_engine::EngineError;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

pub(crate) fn engine_error_to_response(error: EngineError) -> Response {
    let status = match &error {
        EngineError::Queue(QueueError::InvalidDuration { .. })
        | EngineError::Queue(QueueError::UnknownSpot { .. }) => StatusCode::BAD_REQUEST,
        EngineError::Queue(QueueError::DuplicateSpot { .. }) => StatusCode::CONFLICT,
        EngineError::Queue(QueueError::RequestNotFound { .. }) => StatusCode::NOT_FOUND,
        EngineError::Store(_) | EngineError::StateLock(_) => {
            tracing::error!("Request failed: {}", error);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Server error: {}", error),
            );
        }
    };

    error_response(status, error.to_string())
}
