//! Conversation service: the synchronous glue between storage and the
//! scoring engine. Handlers run these under `spawn_blocking`.

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use kindle_db::models::NewMessage;
use kindle_scoring::{AvatarStage, DEEPENING_THRESHOLD};
use kindle_types::api::{AvatarResponse, Claims, ConversationResponse};
use kindle_types::models::{Connection, Message};

use crate::state::AppStateInner;

/// Longest message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not a participant of this connection")]
    Forbidden,

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map to a response status, logging anything that is our fault.
    pub fn into_status(self) -> StatusCode {
        if let Self::Storage(e) = &self {
            error!("Storage error: {:#}", e);
        }
        self.status()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

fn load_connection(ctx: &AppStateInner, connection_id: Uuid) -> ServiceResult<Connection> {
    let row = ctx
        .db
        .get_connection(&connection_id.to_string())?
        .ok_or(ServiceError::NotFound("connection"))?;
    Ok(row.into_model()?)
}

fn load_participating(
    ctx: &AppStateInner,
    connection_id: Uuid,
    user_id: Uuid,
) -> ServiceResult<Connection> {
    let connection = load_connection(ctx, connection_id)?;
    if !connection.involves(user_id) {
        return Err(ServiceError::Forbidden);
    }
    Ok(connection)
}

/// Open a connection with `partner_id`, or return the existing one.
/// The flag is true when a new connection was created.
pub fn open_connection(
    ctx: &AppStateInner,
    me: &Claims,
    partner_id: Uuid,
) -> ServiceResult<(Connection, bool)> {
    if partner_id == me.sub {
        return Err(ServiceError::Invalid("cannot connect with yourself".into()));
    }

    let my_id = me.sub.to_string();
    let partner = partner_id.to_string();

    ctx.db.ensure_user(&my_id, &me.username)?;
    if ctx.db.get_user_by_id(&partner)?.is_none() {
        return Err(ServiceError::NotFound("user"));
    }

    let candidate_id = Uuid::new_v4().to_string();
    let (row, created) = ctx
        .db
        .find_or_create_connection(&candidate_id, &my_id, &partner)?;
    let connection = row.into_model()?;
    if created {
        info!("Connection {} opened between {} and {}", connection.id, my_id, partner);
    }

    Ok((connection, created))
}

pub fn list_connections(ctx: &AppStateInner, me: &Claims) -> ServiceResult<Vec<Connection>> {
    let rows = ctx.db.list_connections_for_user(&me.sub.to_string())?;
    let connections = rows
        .into_iter()
        .map(|row| row.into_model())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(connections)
}

/// Store a message, flagging it against the connection's recent history.
/// The first message on a connection moves it from exploring to connected.
pub fn send_message(
    ctx: &AppStateInner,
    connection_id: Uuid,
    sender_id: Uuid,
    text: &str,
) -> ServiceResult<Message> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ServiceError::Invalid("message is empty".into()));
    }
    let length_chars = text.chars().count();
    if length_chars > MAX_MESSAGE_CHARS {
        return Err(ServiceError::Invalid(format!(
            "message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let connection = load_participating(ctx, connection_id, sender_id)?;
    let cid = connection.id.to_string();
    let scorer = ctx.scorer();

    // Enough history for both the min-history rule and the duplicate window
    let policy = scorer.policy();
    let window = u32::try_from(policy.duplicate_window.max(policy.min_history))
        .unwrap_or(u32::MAX);

    let message_id = Uuid::new_v4().to_string();
    let sender = sender_id.to_string();
    let new = NewMessage {
        id: &message_id,
        connection_id: &cid,
        sender_id: &sender,
        text,
        length_chars: length_chars as i64,
    };
    let (row, connected) = ctx.db.append_message(&new, window, |recent| {
        let history: Vec<&str> = recent.iter().map(|m| m.text.as_str()).collect();
        Ok(scorer.classify(&cid, text, &history).is_repetitive())
    })?;

    if connected {
        info!("Connection {} is now connected", cid);
    }

    Ok(row.into_model()?)
}

/// Recompute a conversation's quality and evolution from its live message
/// list, cache the aggregate and ratchet both participants' avatars.
pub fn view_conversation(
    ctx: &AppStateInner,
    connection_id: Uuid,
    viewer_id: Uuid,
) -> ServiceResult<ConversationResponse> {
    let mut connection = load_participating(ctx, connection_id, viewer_id)?;
    let cid = connection.id.to_string();

    let messages = ctx
        .db
        .get_messages(&cid)?
        .into_iter()
        .map(|row| row.into_model())
        .collect::<anyhow::Result<Vec<_>>>()?;

    let scorer = ctx.scorer();
    let quality_score = scorer.score(&cid, &messages).score;
    let message_count = messages.len() as i64;
    let evolution = scorer.evolve(&cid, message_count, quality_score);

    let participants = [connection.user_a.to_string(), connection.user_b.to_string()];
    let ratchets = ctx.db.record_conversation_view(
        &cid,
        message_count,
        quality_score,
        &[participants[0].as_str(), participants[1].as_str()],
        |user_id, stored| scorer.ratchet(user_id, stored, evolution),
    )?;

    let viewer = viewer_id.to_string();
    let avatar_evolution = participants
        .iter()
        .zip(&ratchets)
        .find(|(user_id, _)| **user_id == viewer)
        .map_or(0.0, |(_, &(_, stored))| stored);

    connection.message_count = message_count;
    connection.quality_score = quality_score;

    Ok(ConversationResponse {
        connection,
        messages,
        quality_score,
        evolution,
        avatar_evolution,
        avatar_stage: AvatarStage::from_evolution(avatar_evolution).to_string(),
        deepening: evolution > DEEPENING_THRESHOLD,
    })
}

pub fn avatar_for(ctx: &AppStateInner, me: &Claims) -> ServiceResult<AvatarResponse> {
    let user_id = me.sub.to_string();
    ctx.db.ensure_user(&user_id, &me.username)?;
    let evolution = ctx.db.get_avatar_evolution(&user_id)?;
    Ok(AvatarResponse {
        user_id: me.sub,
        evolution,
        stage: AvatarStage::from_evolution(evolution).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kindle_db::Database;
    use kindle_scoring::{NullLogger, ScoringEvent, ScoringLogger, ScoringPolicy};

    use super::*;

    fn ctx() -> AppStateInner {
        AppStateInner::new(
            Database::open_in_memory().unwrap(),
            "test-secret".into(),
            ScoringPolicy::default(),
        )
        .with_logger(Arc::new(NullLogger))
    }

    fn claims(name: &str) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            username: name.into(),
            exp: usize::MAX,
        }
    }

    fn pair(ctx: &AppStateInner) -> (Claims, Claims, Connection) {
        let a = claims("ada");
        let b = claims("bo");
        avatar_for(ctx, &b).unwrap();
        let (connection, created) = open_connection(ctx, &a, b.sub).unwrap();
        assert!(created);
        (a, b, connection)
    }

    #[test]
    fn open_connection_validates_partner() {
        let ctx = ctx();
        let a = claims("ada");
        assert!(matches!(
            open_connection(&ctx, &a, a.sub),
            Err(ServiceError::Invalid(_))
        ));
        assert!(matches!(
            open_connection(&ctx, &a, Uuid::new_v4()),
            Err(ServiceError::NotFound("user"))
        ));
    }

    #[test]
    fn reopening_returns_existing_connection() {
        let ctx = ctx();
        let (a, b, connection) = pair(&ctx);
        let (again, created) = open_connection(&ctx, &b, a.sub).unwrap();
        assert!(!created);
        assert_eq!(again.id, connection.id);
        assert_eq!(list_connections(&ctx, &a).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_opens_share_one_connection() {
        let ctx = ctx();
        let a = claims("ada");
        let b = claims("bo");
        avatar_for(&ctx, &a).unwrap();
        avatar_for(&ctx, &b).unwrap();

        let results: Vec<(Connection, bool)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let (me, partner) = if i % 2 == 0 { (&a, b.sub) } else { (&b, a.sub) };
                    let ctx = &ctx;
                    s.spawn(move || open_connection(ctx, me, partner).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
        assert!(results.iter().all(|(c, _)| c.id == results[0].0.id));
        assert_eq!(list_connections(&ctx, &a).unwrap().len(), 1);
    }

    #[test]
    fn first_message_connects() {
        let ctx = ctx();
        let (a, _, connection) = pair(&ctx);
        assert_eq!(connection.status.as_str(), "exploring");

        let msg =
            send_message(&ctx, connection.id, a.sub, "  Hi! How was your weekend?  ").unwrap();
        assert_eq!(msg.text, "Hi! How was your weekend?");
        assert_eq!(msg.length_chars, 25);
        assert!(!msg.is_repetitive);

        let reloaded = load_connection(&ctx, connection.id).unwrap();
        assert_eq!(reloaded.status.as_str(), "connected");
    }

    #[test]
    fn outsiders_and_bad_text_rejected() {
        let ctx = ctx();
        let (a, _, connection) = pair(&ctx);
        let stranger = claims("eve");

        assert!(matches!(
            send_message(&ctx, connection.id, stranger.sub, "let me in please"),
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            view_conversation(&ctx, connection.id, stranger.sub),
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            send_message(&ctx, connection.id, a.sub, "   "),
            Err(ServiceError::Invalid(_))
        ));
        let huge = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            send_message(&ctx, connection.id, a.sub, &huge),
            Err(ServiceError::Invalid(_))
        ));
        assert!(matches!(
            send_message(&ctx, Uuid::new_v4(), a.sub, "anyone there at all?"),
            Err(ServiceError::NotFound("connection"))
        ));
    }

    #[test]
    fn repetition_is_flagged_against_history() {
        let ctx = ctx();
        let (a, b, connection) = pair(&ctx);

        let first = send_message(&ctx, connection.id, a.sub, "ok").unwrap();
        assert!(!first.is_repetitive, "no history yet");

        send_message(&ctx, connection.id, b.sub, "I love hiking in the mountains").unwrap();
        let low = send_message(&ctx, connection.id, a.sub, "ok").unwrap();
        assert!(low.is_repetitive);

        let dup =
            send_message(&ctx, connection.id, a.sub, "i love hiking in the MOUNTAINS").unwrap();
        assert!(dup.is_repetitive);
    }

    #[test]
    fn concurrent_duplicates_are_flagged() {
        let ctx = ctx();
        let (a, b, connection) = pair(&ctx);
        send_message(&ctx, connection.id, a.sub, "Do you have any plans for the summer?").unwrap();
        send_message(&ctx, connection.id, b.sub, "Thinking about a week by the sea").unwrap();

        let flags: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..6)
                .map(|_| {
                    let ctx = &ctx;
                    let sender = a.sub;
                    s.spawn(move || {
                        send_message(ctx, connection.id, sender, "That sounds lovely, which one?")
                            .unwrap()
                            .is_repetitive
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // Each send classifies against the history including the ones before it
        assert_eq!(flags.iter().filter(|repetitive| !**repetitive).count(), 1);
    }

    #[test]
    fn viewing_scores_and_ratchets_both_partners() {
        let ctx = ctx();
        let (a, b, connection) = pair(&ctx);

        let lines = [
            "Hey! I saw you like climbing, where do you usually go?",
            "Mostly the crag by the river, it has great routes for beginners",
            "I have been meaning to try outdoor climbing for ages now",
            "You should come along next Saturday, we go early in the morning",
        ];
        for (i, line) in lines.iter().enumerate() {
            let sender = if i % 2 == 0 { a.sub } else { b.sub };
            send_message(&ctx, connection.id, sender, line).unwrap();
        }

        let view = view_conversation(&ctx, connection.id, a.sub).unwrap();
        assert_eq!(view.messages.len(), 4);
        assert_eq!(view.quality_score, 1.0);
        // 1.0 * 0.7 + (4 / 20) * 0.3
        assert!((view.evolution - 0.76).abs() < 1e-9);
        assert!(view.deepening);
        assert_eq!(view.avatar_stage, "deepening");
        assert_eq!(view.connection.message_count, 4);

        let partner = avatar_for(&ctx, &b).unwrap();
        assert!((partner.evolution - 0.76).abs() < 1e-9);

        // idempotent recomputation
        let again = view_conversation(&ctx, connection.id, b.sub).unwrap();
        assert_eq!(again.quality_score, view.quality_score);
        assert_eq!(again.evolution, view.evolution);
    }

    #[test]
    fn weaker_conversation_does_not_regress_avatar() {
        let ctx = ctx();
        let (a, _, good) = pair(&ctx);
        let opener = "Tell me about the best trip you have ever taken";
        send_message(&ctx, good.id, a.sub, opener).unwrap();
        let high = view_conversation(&ctx, good.id, a.sub).unwrap().avatar_evolution;
        assert!(high > 0.5);

        let c = claims("cy");
        avatar_for(&ctx, &c).unwrap();
        let (weak, _) = open_connection(&ctx, &a, c.sub).unwrap();
        send_message(&ctx, weak.id, c.sub, "hey").unwrap();
        let view = view_conversation(&ctx, weak.id, a.sub).unwrap();
        assert_eq!(view.quality_score, 0.0);
        assert!(view.evolution < high);
        assert_eq!(view.avatar_evolution, high);
    }

    #[derive(Default)]
    struct RecordingLogger {
        events: std::sync::Mutex<Vec<(String, ScoringEvent)>>,
    }

    impl ScoringLogger for RecordingLogger {
        fn log(&self, subject: &str, event: &ScoringEvent) {
            self.events
                .lock()
                .unwrap()
                .push((subject.to_string(), event.clone()));
        }
    }

    #[test]
    fn view_logs_a_ratchet_per_participant() {
        let logger = Arc::new(RecordingLogger::default());
        let ctx = ctx().with_logger(logger.clone());
        let (a, b, connection) = pair(&ctx);
        let question = "What made you pick this city to live in?";
        send_message(&ctx, connection.id, a.sub, question).unwrap();
        view_conversation(&ctx, connection.id, b.sub).unwrap();

        let events = logger.events.lock().unwrap();
        let ratchets: Vec<&String> = events
            .iter()
            .filter(|(_, e)| matches!(e, ScoringEvent::EvolutionRatcheted { .. }))
            .map(|(subject, _)| subject)
            .collect();
        assert_eq!(ratchets, [&a.sub.to_string(), &b.sub.to_string()]);
    }

    #[test]
    fn empty_conversation_view_is_zero() {
        let ctx = ctx();
        let (a, _, connection) = pair(&ctx);
        let view = view_conversation(&ctx, connection.id, a.sub).unwrap();
        assert_eq!(view.quality_score, 0.0);
        assert_eq!(view.evolution, 0.0);
        assert_eq!(view.avatar_stage, "neutral");
        assert!(!view.deepening);
    }
}
