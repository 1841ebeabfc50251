use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use kindle_types::api::{Claims, SendMessageRequest};

use crate::connections::blocking;
use crate::service;
use crate::state::AppState;

/// POST /connections/{connection_id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(connection_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let sender = claims.sub;
    let message = blocking(&state, move |ctx| {
        service::send_message(ctx, connection_id, sender, &req.text)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}
