//! Charla API crate - axum HTTP server for text and voice turns.
//!
//! Exposes the conversation flow over JSON and multipart endpoints so web and
//! mobile front-ends can talk to the assistant without holding credentials.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
