//! Pipeline control API handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use depot_core::broker::MessageBroker;
use depot_core::messages::{ControlAction, ControlMessage};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ControlBody {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct PipelineStatusResponse {
    pub state: String,
    pub consuming: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Current pipeline consumption state
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<PipelineStatusResponse> {
    let switch = state.switch();
    Json(PipelineStatusResponse {
        state: format!("{:?}", switch.state()).to_lowercase(),
        consuming: switch.is_consuming(),
    })
}

async fn enqueue_control(
    state: &AppState,
    action: ControlAction,
    username: &str,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state
        .broker()
        .send_control(ControlMessage::new(action, username))
        .await
        .map_err(|e| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
        })?;
    Ok(StatusCode::ACCEPTED)
}

/// Quiet the pipeline
pub async fn quiet(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ControlBody>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    enqueue_control(&state, ControlAction::Quiet, &body.username).await
}

/// Unquiet the pipeline
pub async fn unquiet(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ControlBody>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    enqueue_control(&state, ControlAction::Unquiet, &body.username).await
}

/// Stop the pipeline
pub async fn stop(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ControlBody>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    enqueue_control(&state, ControlAction::Stop, &body.username).await
}
