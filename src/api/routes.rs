//! Route table.

use std::sync::Arc;

use axum::Router;
use axum::routing::{any, get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::API_PREFIX;
use super::auth::BasicAuthLayer;
use super::handlers::{
    AppState, create_task, delete_task, get_task, health_check, list_tasks, method_not_allowed,
    route_not_found, update_task,
};

/// Builds the application router.
///
/// Everything under [`API_PREFIX`] requires HTTP Basic credentials, including
/// unknown paths and the bare `API_PREFIX/`, which answer 404 only once
/// authenticated. `/health` is open.
pub fn create_router(state: AppState) -> Router {
    let authenticate = BasicAuthLayer::new(Arc::clone(&state.credential_store));

    // Nesting does not cover the prefix with a trailing slash.
    let api_index = format!("{API_PREFIX}/");

    let api = Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(authenticate.clone());

    Router::new()
        .route("/health", get(health_check))
        .route(&api_index, any(route_not_found).layer(authenticate))
        .nest(API_PREFIX, api)
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
