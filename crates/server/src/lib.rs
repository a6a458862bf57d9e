pub mod alerts;
pub mod auth;
pub mod cookies;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod rag;
pub mod routes;
pub mod sse;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
