use axum::{
    Json, Router, middleware,
    routing::{get, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{avatar, connections, messages};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route(
            "/connections",
            get(connections::list_connections).post(connections::open_connection),
        )
        .route("/connections/{connection_id}", get(connections::view_conversation))
        .route("/connections/{connection_id}/messages", post(messages::send_message))
        .route("/me/avatar", get(avatar::get_avatar))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
