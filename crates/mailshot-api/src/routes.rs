//! API routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::handlers::{health, logs, messages, recipients, send};
use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/ready", get(health::readiness))
        .with_state(state.clone());

    let message_routes = Router::new()
        .route(
            "/",
            get(messages::list_messages).post(messages::create_message),
        )
        .route(
            "/:id",
            get(messages::get_message)
                .put(messages::update_message)
                .delete(messages::delete_message),
        )
        .route("/:id/html", get(messages::get_html))
        .route("/:id/text", get(messages::get_text))
        .route(
            "/:id/contact-groups",
            get(messages::get_contact_groups).put(messages::set_contact_groups),
        )
        .route(
            "/:id/recipients",
            get(recipients::preview_recipients).post(recipients::import_recipients),
        )
        .route("/:id/send-test", post(send::send_test))
        .route("/:id/send-now", post(send::send_now))
        .route("/:id/logs", get(logs::list_logs));

    // Routes added after the auth layer stay open
    let api_v1 = Router::new()
        .nest("/messages", message_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route("/health", get(health::health))
        .with_state(state);

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
}
