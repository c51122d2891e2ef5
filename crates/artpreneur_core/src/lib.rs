pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod scoring;

pub use config::ArtpreneurConfig;
pub use engine::HealthScoreEngine;
pub use error::HealthScoreError;
pub use memory::{ActivitySource, MemoryStore};
pub use scoring::{ActivitySignals, HealthScores, ScoreBand, ScoreWeights, ScoringConfig};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored health score row, as the dashboard reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScoreRecord {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub scores: HealthScores,
    pub last_calculated_at: DateTime<Utc>,
}

impl HealthScoreRecord {
    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.scores.overall_score)
    }
}

/// Read access to the activity tables plus the single health score write.
///
/// Every read is scoped by `user_id` and a lower time bound. Implementations
/// must make `upsert_health_score` atomic per user.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Number of artwork valuations created at or after `since`.
    async fn count_valuations(&self, user_id: Uuid, since: DateTime<Utc>) -> anyhow::Result<u64>;

    /// Sum of expense amounts dated on or after `since` (0 when there are none).
    async fn total_expenses(&self, user_id: Uuid, since: NaiveDate) -> anyhow::Result<f64>;

    /// Mean recommended price, `None` when the user has no calculations.
    async fn average_recommended_price(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Option<f64>>;

    async fn count_forum_posts(&self, user_id: Uuid, since: DateTime<Utc>) -> anyhow::Result<u64>;

    async fn count_forum_comments(&self, user_id: Uuid, since: DateTime<Utc>)
        -> anyhow::Result<u64>;

    /// Insert or update the one health score row for `user_id`.
    async fn upsert_health_score(
        &self,
        user_id: Uuid,
        scores: &HealthScores,
        calculated_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    async fn load_health_score(&self, user_id: Uuid) -> anyhow::Result<Option<HealthScoreRecord>>;
}

/// Resolves a bearer credential into the id of the user it was issued to.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Uuid, HealthScoreError>;
}

/// Source of "now" for window computation and `last_calculated_at`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant. Used to make repeated runs deterministic.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
