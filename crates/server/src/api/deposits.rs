//! Deposit API handlers.
//!
//! Mutations never touch deposit state directly: they enqueue operation
//! messages and return 202, and the pipeline applies them in order.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use depot_core::broker::MessageBroker;
use depot_core::deposit::Deposit;
use depot_core::messages::OperationMessage;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for registering a deposit
#[derive(Debug, Deserialize)]
pub struct RegisterDepositBody {
    /// Caller-supplied id; generated when absent.
    pub deposit_id: Option<String>,
    /// Submitting user.
    pub username: String,
    /// Submission metadata, stored verbatim on the deposit.
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

/// Request body for per-deposit operations
#[derive(Debug, Deserialize)]
pub struct OperationBody {
    pub username: String,
}

/// Response for accepted operations
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub deposit_id: String,
}

/// Response for deposit reads
#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub id: String,
    pub state: String,
    pub fields: HashMap<String, String>,
}

impl From<Deposit> for DepositResponse {
    fn from(deposit: Deposit) -> Self {
        Self {
            id: deposit.id,
            state: deposit.state.to_string(),
            fields: deposit.fields,
        }
    }
}

/// Response for listing deposits
#[derive(Debug, Serialize)]
pub struct ListDepositsResponse {
    pub deposits: Vec<DepositResponse>,
    pub total: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn storage_error(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn broker_error(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new deposit
pub async fn register_deposit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterDepositBody>,
) -> Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    let deposit_id = body
        .deposit_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let msg = OperationMessage::register(&deposit_id, &body.username, body.fields);
    state
        .broker()
        .send_operation(msg)
        .await
        .map_err(broker_error)?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { deposit_id })))
}

/// List all deposits
pub async fn list_deposits(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListDepositsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let deposits = state.store().get_all().map_err(storage_error)?;
    let deposits: Vec<DepositResponse> = deposits.into_iter().map(Into::into).collect();
    let total = deposits.len();
    Ok(Json(ListDepositsResponse { deposits, total }))
}

/// Get one deposit
pub async fn get_deposit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DepositResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.store().get(&id).map_err(storage_error)? {
        Some(deposit) => Ok(Json(deposit.into())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("deposit not found: {id}"),
            }),
        )),
    }
}

async fn enqueue_operation(
    state: &AppState,
    msg: OperationMessage,
) -> Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    let deposit_id = msg.deposit_id.clone();
    state
        .broker()
        .send_operation(msg)
        .await
        .map_err(broker_error)?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { deposit_id })))
}

/// Pause a deposit
pub async fn pause_deposit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<OperationBody>,
) -> Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    enqueue_operation(&state, OperationMessage::pause(&id, &body.username)).await
}

/// Resume a deposit
pub async fn resume_deposit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<OperationBody>,
) -> Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    enqueue_operation(&state, OperationMessage::resume(&id, &body.username)).await
}

/// Quiet a deposit
pub async fn quiet_deposit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<OperationBody>,
) -> Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    enqueue_operation(&state, OperationMessage::quiet(&id, &body.username)).await
}

/// Quiet every running deposit
pub async fn quiet_all(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OperationBody>,
) -> StatusCode {
    state.controller().quiet_all_deposits(&body.username).await;
    StatusCode::OK
}

/// Resume every resumable deposit
pub async fn unquiet_all(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OperationBody>,
) -> StatusCode {
    state
        .controller()
        .unquiet_all_deposits(&body.username)
        .await;
    StatusCode::OK
}
