//! HTTP surface: shared state, router and request handlers.
pub mod handlers;
pub mod routes;

pub use routes::{router, AppState};
