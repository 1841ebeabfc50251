use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("invalid scoring policy: {0}")]
    Invalid(String),

    #[error("scoring policy parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunable constants of the scoring engine.
///
/// The defaults are the compatibility values every stored score was
/// computed with; overriding them changes how new messages are flagged and
/// how conversations are scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringPolicy {
    /// Prior messages required before anything can be flagged.
    pub min_history: usize,

    /// Trimmed messages shorter than this are flagged as low-effort.
    pub min_content_chars: usize,

    /// How many of the most recent prior messages are checked for duplicates.
    pub duplicate_window: usize,

    /// Messages must be strictly longer than this to count toward quality.
    pub min_scored_chars: i64,

    /// Per-message contribution is `length / per_message_divisor`...
    pub per_message_divisor: f64,

    /// ...capped at this value.
    pub per_message_cap: f64,

    /// Message count at which the volume term saturates.
    pub volume_saturation: i64,

    pub quality_weight: f64,
    pub volume_weight: f64,
}

impl ScoringPolicy {
    pub const DEFAULT: ScoringPolicy = ScoringPolicy {
        min_history: 2,
        min_content_chars: 10,
        duplicate_window: 5,
        min_scored_chars: 20,
        per_message_divisor: 100.0,
        per_message_cap: 0.5,
        volume_saturation: 20,
        quality_weight: 0.7,
        volume_weight: 0.3,
    };

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.duplicate_window == 0 {
            return Err(PolicyError::Invalid(
                "duplicate_window must be >= 1".to_string(),
            ));
        }
        if self.min_scored_chars < 0 {
            return Err(PolicyError::Invalid(format!(
                "min_scored_chars must be >= 0, got {}",
                self.min_scored_chars
            )));
        }
        if !self.per_message_divisor.is_finite() || self.per_message_divisor <= 0.0 {
            return Err(PolicyError::Invalid(format!(
                "per_message_divisor must be > 0, got {}",
                self.per_message_divisor
            )));
        }
        if !(self.per_message_cap > 0.0 && self.per_message_cap <= 1.0) {
            return Err(PolicyError::Invalid(format!(
                "per_message_cap must be in (0, 1], got {}",
                self.per_message_cap
            )));
        }
        if self.volume_saturation < 1 {
            return Err(PolicyError::Invalid(format!(
                "volume_saturation must be >= 1, got {}",
                self.volume_saturation
            )));
        }
        for (name, w) in [
            ("quality_weight", self.quality_weight),
            ("volume_weight", self.volume_weight),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(PolicyError::Invalid(format!(
                    "{name} must be in [0, 1], got {w}"
                )));
            }
        }
        if (self.quality_weight + self.volume_weight - 1.0).abs() > 1e-9 {
            return Err(PolicyError::Invalid(format!(
                "quality_weight + volume_weight must equal 1.0, got {} + {}",
                self.quality_weight, self.volume_weight
            )));
        }
        Ok(())
    }

    /// Parse and validate a policy. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let policy: ScoringPolicy = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
