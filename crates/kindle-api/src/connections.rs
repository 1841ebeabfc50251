use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use kindle_types::api::{Claims, OpenConnectionRequest};

use crate::service::{self, ServiceError};
use crate::state::{AppState, AppStateInner};

/// Run a service call off the async runtime and map its error to a status.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&AppStateInner) -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(state.as_ref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(ServiceError::into_status)
}

/// POST /connections
pub async fn open_connection(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<OpenConnectionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let (connection, created) =
        blocking(&state, move |ctx| service::open_connection(ctx, &claims, req.partner_id)).await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(connection)))
}

/// GET /connections
pub async fn list_connections(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let connections = blocking(&state, move |ctx| service::list_connections(ctx, &claims)).await?;
    Ok(Json(connections))
}

/// GET /connections/{connection_id}: recomputes the quality score and
/// avatar evolution from the live message list on every view.
pub async fn view_conversation(
    State(state): State<AppState>,
    Path(connection_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let viewer = claims.sub;
    let view = blocking(&state, move |ctx| {
        service::view_conversation(ctx, connection_id, viewer)
    })
    .await?;
    Ok(Json(view))
}
