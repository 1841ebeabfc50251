//! Kindle Scoring Engine
//!
//! Pure heuristics over conversation snapshots:
//! - repetition / low-effort classification of an incoming message
//! - conversation quality score in [0, 1]
//! - avatar evolution in [0, 1], merged per user with a monotonic ratchet
//!
//! Nothing here performs I/O or holds state between calls. Callers that
//! want telemetry go through [`Scorer`] with an explicit [`ScoringLogger`].

pub mod evolution;
pub mod logging;
pub mod message;
pub mod policy;
pub mod quality;
pub mod repetition;
pub mod scorer;

pub use evolution::{
    AvatarStage, DEEPENING_THRESHOLD, EVOLVED_THRESHOLD, compute_evolution, ratchet_evolution,
};
pub use logging::{NullLogger, ScoringEvent, ScoringLogger, TracingLogger};
pub use message::{MessageSample, ScoredMessage};
pub use policy::{PolicyError, ScoringPolicy};
pub use quality::{QualityBreakdown, score_conversation};
pub use repetition::{Classification, classify_repetitive};
pub use scorer::Scorer;
