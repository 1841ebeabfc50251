use std::fmt;

use crate::policy::ScoringPolicy;

/// Evolution above this is "visibly evolved" (avatar glyph changes).
pub const EVOLVED_THRESHOLD: f64 = 0.3;

/// Evolution above this is "deepening" (partners get a notice).
pub const DEEPENING_THRESHOLD: f64 = 0.5;

/// Clamp to [0, 1]. NaN reads as 0; infinities saturate.
fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl ScoringPolicy {
    pub fn compute_evolution(&self, message_count: i64, quality_score: f64) -> f64 {
        let volume =
            (message_count.max(0) as f64 / self.volume_saturation as f64).min(1.0);
        let evolution =
            (unit(quality_score) * self.quality_weight + volume * self.volume_weight).min(1.0);
        unit(evolution)
    }
}

/// Avatar evolution in [0, 1] from a connection's message count and
/// freshly computed quality score, under the default policy.
pub fn compute_evolution(message_count: i64, quality_score: f64) -> f64 {
    ScoringPolicy::DEFAULT.compute_evolution(message_count, quality_score)
}

/// Merge a newly computed evolution into a stored one. Never regresses.
pub fn ratchet_evolution(stored: f64, computed: f64) -> f64 {
    unit(stored).max(unit(computed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AvatarStage {
    Neutral,
    Evolved,
    Deepening,
}

impl AvatarStage {
    pub fn from_evolution(evolution: f64) -> Self {
        let evolution = unit(evolution);
        if evolution > DEEPENING_THRESHOLD {
            Self::Deepening
        } else if evolution > EVOLVED_THRESHOLD {
            Self::Evolved
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Evolved => "evolved",
            Self::Deepening => "deepening",
        }
    }

    pub fn is_evolved(&self) -> bool {
        *self >= Self::Evolved
    }
}

impl fmt::Display for AvatarStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
