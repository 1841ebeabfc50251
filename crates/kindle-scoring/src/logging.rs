//! Scoring telemetry.
//!
//! The engine never logs on its own. A caller that wants a record of what
//! was decided hands a [`ScoringLogger`] to [`crate::Scorer`].

use std::fmt;

use crate::evolution::AvatarStage;
use crate::repetition::Classification;

#[derive(Debug, Clone, PartialEq)]
pub enum ScoringEvent {
    MessageClassified {
        classification: Classification,
        history_len: usize,
    },
    ConversationScored {
        considered: usize,
        valid: usize,
        score: f64,
    },
    EvolutionComputed {
        message_count: i64,
        quality_score: f64,
        evolution: f64,
        stage: AvatarStage,
    },
    EvolutionRatcheted {
        previous: f64,
        computed: f64,
        stored: f64,
    },
}

impl fmt::Display for ScoringEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageClassified { classification, history_len } => write!(
                f,
                "message_classified result={} history={}",
                classification.as_str(),
                history_len
            ),
            Self::ConversationScored { considered, valid, score } => write!(
                f,
                "conversation_scored messages={} valid={} score={:.3}",
                considered, valid, score
            ),
            Self::EvolutionComputed { message_count, quality_score, evolution, stage } => write!(
                f,
                "evolution_computed messages={} quality={:.3} evolution={:.3} stage={}",
                message_count, quality_score, evolution, stage
            ),
            Self::EvolutionRatcheted { previous, computed, stored } => write!(
                f,
                "evolution_ratcheted previous={:.3} computed={:.3} stored={:.3}",
                previous, computed, stored
            ),
        }
    }
}

pub trait ScoringLogger: Send + Sync {
    /// `subject` names what was scored, usually a connection or user id.
    fn log(&self, subject: &str, event: &ScoringEvent);
}

/// Logger that uses the `tracing` crate.
pub struct TracingLogger;

impl ScoringLogger for TracingLogger {
    fn log(&self, subject: &str, event: &ScoringEvent) {
        // Stage changes and ratchet moves at info, per-message noise at debug
        let notable = match event {
            ScoringEvent::EvolutionRatcheted { previous, stored, .. } => stored > previous,
            ScoringEvent::EvolutionComputed { stage, .. } => stage.is_evolved(),
            _ => false,
        };
        if notable {
            tracing::info!(subject = %subject, "{}", event);
        } else {
            tracing::debug!(subject = %subject, "{}", event);
        }
    }
}

/// No-op logger that discards all events.
pub struct NullLogger;

impl ScoringLogger for NullLogger {
    fn log(&self, _subject: &str, _event: &ScoringEvent) {}
}
