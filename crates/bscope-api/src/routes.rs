//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{healthz, storage_finalize};
use crate::middleware::{bearer_auth, request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let push_routes = Router::new()
        .route("/pubsub/storage-finalize", post(storage_finalize))
        .layer(middleware::from_fn_with_state(state.clone(), bearer_auth));

    Router::new()
        .merge(push_routes)
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}
