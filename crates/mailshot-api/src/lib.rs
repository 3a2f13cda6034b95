//! Mailshot API - administrative REST API
//!
//! Thin HTTP adapter over the dispatch core: message authoring, recipient
//! import, send triggers and the read-only delivery log.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
