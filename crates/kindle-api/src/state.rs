use std::sync::Arc;

use kindle_db::Database;
use kindle_scoring::{Scorer, ScoringLogger, ScoringPolicy, TracingLogger};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub policy: ScoringPolicy,
    pub logger: Arc<dyn ScoringLogger>,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String, policy: ScoringPolicy) -> Self {
        Self {
            db,
            jwt_secret,
            policy,
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ScoringLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn scorer(&self) -> Scorer<'_> {
        Scorer::new(&self.policy, self.logger.as_ref())
    }
}
