use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use kindle_types::api::Claims;

use crate::connections::blocking;
use crate::service;
use crate::state::AppState;

/// GET /me/avatar
pub async fn get_avatar(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let avatar = blocking(&state, move |ctx| service::avatar_for(ctx, &claims)).await?;
    Ok(Json(avatar))
}
