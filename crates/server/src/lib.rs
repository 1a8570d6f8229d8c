pub mod api;
pub mod jobs;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
