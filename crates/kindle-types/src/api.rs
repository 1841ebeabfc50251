use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Connection, Message};

// -- JWT Claims --

/// Bearer token claims. Tokens are minted by the identity service; this
/// backend only validates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Connections --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenConnectionRequest {
    pub partner_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub connection: Connection,
    pub messages: Vec<Message>,
    pub quality_score: f64,
    /// Evolution computed from this conversation alone.
    pub evolution: f64,
    /// The viewer's stored evolution after the ratchet.
    pub avatar_evolution: f64,
    pub avatar_stage: String,
    pub deepening: bool,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: String,
}

// -- Avatar --

#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub user_id: Uuid,
    pub evolution: f64,
    pub stage: String,
}
