use crate::message::ScoredMessage;
use crate::policy::ScoringPolicy;

/// Intermediate sums behind a quality score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityBreakdown {
    pub considered: usize,
    /// Messages that were neither repetitive nor too short.
    pub valid: usize,
    pub total: f64,
    pub score: f64,
}

impl ScoringPolicy {
    pub fn score_breakdown<M: ScoredMessage>(&self, messages: &[M]) -> QualityBreakdown {
        let mut total = 0.0;
        let mut valid = 0usize;

        for message in messages {
            let length = message.length_chars().max(0);
            if message.is_repetitive() || length <= self.min_scored_chars {
                continue;
            }
            total += (length as f64 / self.per_message_divisor).min(self.per_message_cap);
            valid += 1;
        }

        // The average is rescaled so a message at the cap scores 1.0
        let score = if valid == 0 {
            0.0
        } else {
            (total / valid as f64 / self.per_message_cap).clamp(0.0, 1.0)
        };

        QualityBreakdown {
            considered: messages.len(),
            valid,
            total,
            score,
        }
    }

    pub fn score_conversation<M: ScoredMessage>(&self, messages: &[M]) -> f64 {
        self.score_breakdown(messages).score
    }
}

/// Conversation quality in [0, 1] under the default policy.
pub fn score_conversation<M: ScoredMessage>(messages: &[M]) -> f64 {
    ScoringPolicy::DEFAULT.score_conversation(messages)
}
