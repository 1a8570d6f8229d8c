pub mod deposits;
pub mod handlers;
pub mod pipeline;
pub mod routes;

pub use routes::create_router;
