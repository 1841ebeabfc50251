use crate::evolution::{AvatarStage, ratchet_evolution};
use crate::logging::{ScoringEvent, ScoringLogger};
use crate::message::ScoredMessage;
use crate::policy::ScoringPolicy;
use crate::quality::QualityBreakdown;
use crate::repetition::Classification;

/// Borrowed view over a policy and a logger. Holds no state of its own, so
/// one can be built per request and dropped afterwards.
#[derive(Clone, Copy)]
pub struct Scorer<'a> {
    policy: &'a ScoringPolicy,
    logger: &'a dyn ScoringLogger,
}

impl<'a> Scorer<'a> {
    pub fn new(policy: &'a ScoringPolicy, logger: &'a dyn ScoringLogger) -> Self {
        Self { policy, logger }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        self.policy
    }

    pub fn classify<M: ScoredMessage>(
        &self,
        subject: &str,
        new_text: &str,
        recent: &[M],
    ) -> Classification {
        let classification = self.policy.classify(new_text, recent);
        self.logger.log(
            subject,
            &ScoringEvent::MessageClassified {
                classification,
                history_len: recent.len(),
            },
        );
        classification
    }

    pub fn score<M: ScoredMessage>(&self, subject: &str, messages: &[M]) -> QualityBreakdown {
        let breakdown = self.policy.score_breakdown(messages);
        self.logger.log(
            subject,
            &ScoringEvent::ConversationScored {
                considered: breakdown.considered,
                valid: breakdown.valid,
                score: breakdown.score,
            },
        );
        breakdown
    }

    pub fn evolve(&self, subject: &str, message_count: i64, quality_score: f64) -> f64 {
        let evolution = self.policy.compute_evolution(message_count, quality_score);
        self.logger.log(
            subject,
            &ScoringEvent::EvolutionComputed {
                message_count,
                quality_score,
                evolution,
                stage: AvatarStage::from_evolution(evolution),
            },
        );
        evolution
    }

    pub fn ratchet(&self, subject: &str, stored: f64, computed: f64) -> f64 {
        let merged = ratchet_evolution(stored, computed);
        self.logger.log(
            subject,
            &ScoringEvent::EvolutionRatcheted {
                previous: stored,
                computed,
                stored: merged,
            },
        );
        merged
    }
}
