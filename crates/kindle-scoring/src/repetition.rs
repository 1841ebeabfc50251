use std::sync::LazyLock;

use regex::Regex;

use crate::message::ScoredMessage;
use crate::policy::ScoringPolicy;

/// Greetings, acknowledgements and bare question marks. Whole-string only.
static LOW_EFFORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:hi|hey|hello|sup|yo|ok|okay|k|yep|yeah|\?|\?!)$")
        .expect("low-effort pattern is valid")
});

/// Outcome of classifying an incoming message, in rule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Not enough prior messages to judge.
    InsufficientHistory,
    TooShort,
    LowEffort,
    /// Exact repeat of a recent message.
    Duplicate,
    Fresh,
}

impl Classification {
    pub fn is_repetitive(self) -> bool {
        matches!(self, Self::TooShort | Self::LowEffort | Self::Duplicate)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientHistory => "insufficient_history",
            Self::TooShort => "too_short",
            Self::LowEffort => "low_effort",
            Self::Duplicate => "duplicate",
            Self::Fresh => "fresh",
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_ascii_lowercase()
}

impl ScoringPolicy {
    /// Classify `new_text` against the chronologically ordered prior
    /// messages of the same conversation. First matching rule wins.
    pub fn classify<M: ScoredMessage>(&self, new_text: &str, recent: &[M]) -> Classification {
        if recent.len() < self.min_history {
            return Classification::InsufficientHistory;
        }

        let normalized = normalize(new_text);

        if normalized.chars().count() < self.min_content_chars {
            return Classification::TooShort;
        }

        if LOW_EFFORT.is_match(&normalized) {
            return Classification::LowEffort;
        }

        let window_start = recent.len().saturating_sub(self.duplicate_window);
        if recent[window_start..]
            .iter()
            .any(|m| normalize(m.text()) == normalized)
        {
            return Classification::Duplicate;
        }

        Classification::Fresh
    }

    pub fn classify_repetitive<M: ScoredMessage>(&self, new_text: &str, recent: &[M]) -> bool {
        self.classify(new_text, recent).is_repetitive()
    }
}

/// Whether `new_text` should be stored with `is_repetitive` set, using the
/// default policy.
pub fn classify_repetitive<M: ScoredMessage>(new_text: &str, recent: &[M]) -> bool {
    ScoringPolicy::DEFAULT.classify_repetitive(new_text, recent)
}
