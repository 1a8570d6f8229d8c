use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{deposits, handlers, pipeline};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Deposits
        .route("/deposits", post(deposits::register_deposit))
        .route("/deposits", get(deposits::list_deposits))
        .route("/deposits/quiet-all", post(deposits::quiet_all))
        .route("/deposits/unquiet-all", post(deposits::unquiet_all))
        .route("/deposits/{id}", get(deposits::get_deposit))
        .route("/deposits/{id}/pause", post(deposits::pause_deposit))
        .route("/deposits/{id}/resume", post(deposits::resume_deposit))
        .route("/deposits/{id}/quiet", post(deposits::quiet_deposit))
        // Pipeline control
        .route("/pipeline", get(pipeline::get_status))
        .route("/pipeline/quiet", post(pipeline::quiet))
        .route("/pipeline/unquiet", post(pipeline::unquiet))
        .route("/pipeline/stop", post(pipeline::stop))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
