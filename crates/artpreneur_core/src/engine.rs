//! Creative Health Score engine.
//!
//! One invocation = read the trailing window's activity, score it, upsert one
//! row. Reads run concurrently; the first failing read aborts the whole
//! invocation before anything is written.

use crate::error::HealthScoreError;
use crate::scoring::{ActivitySignals, HealthScores, ScoringConfig};
use crate::{ActivityStore, Clock, HealthScoreRecord, SystemClock};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct HealthScoreEngine {
    store: Arc<dyn ActivityStore>,
    clock: Arc<dyn Clock>,
    config: ScoringConfig,
}

impl HealthScoreEngine {
    pub fn new(store: Arc<dyn ActivityStore>, config: ScoringConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the wall clock, e.g. with a [`crate::FixedClock`] in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Start of the activity window ending at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, HealthScoreError> {
        Duration::try_days(self.config.window_days as i64)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                HealthScoreError::Configuration(format!(
                    "window of {} days before {} is out of range",
                    self.config.window_days, now
                ))
            })
    }

    /// Compute and persist the health score of `user_id`.
    ///
    /// Returns the five scores only once they are durably stored.
    pub async fn calculate(&self, user_id: Uuid) -> Result<HealthScores, HealthScoreError> {
        let now = self.clock.now();
        let since = self.window_start(now).map_err(|e| {
            tracing::error!(user_id = %user_id, "{}", e);
            e
        })?;
        let signals = self.gather_since(user_id, since).await.map_err(|e| {
            tracing::error!(user_id = %user_id, "Activity read failed: {:#}", e);
            HealthScoreError::DataAccess(e)
        })?;

        let scores = HealthScores::compute(&signals, &self.config);
        tracing::debug!(user_id = %user_id, ?signals, "Activity signals gathered");

        self.store
            .upsert_health_score(user_id, &scores, now)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, "Health score upsert failed: {:#}", e);
                HealthScoreError::Persistence(e)
            })?;

        tracing::info!(
            user_id = %user_id,
            overall = scores.overall_score,
            productivity = scores.productivity_score,
            financial_health = scores.financial_health_score,
            community = scores.community_participation_score,
            "Health score calculated"
        );
        Ok(scores)
    }

    /// The last stored score for `user_id`, if one was ever calculated.
    pub async fn current(&self, user_id: Uuid) -> Result<Option<HealthScoreRecord>, HealthScoreError> {
        self.store
            .load_health_score(user_id)
            .await
            .map_err(HealthScoreError::DataAccess)
    }

    /// Read all activity aggregates for the window ending at `now`.
    pub async fn gather(&self, user_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<ActivitySignals> {
        let since = self.window_start(now)?;
        self.gather_since(user_id, since).await
    }

    async fn gather_since(&self, user_id: Uuid, since: DateTime<Utc>) -> anyhow::Result<ActivitySignals> {
        let since_day = since.date_naive();

        let (valuation_count, total_expenses, average_price, forum_post_count, forum_comment_count) = tokio::try_join!(
            self.store.count_valuations(user_id, since),
            self.store.total_expenses(user_id, since_day),
            self.store.average_recommended_price(user_id, since),
            self.store.count_forum_posts(user_id, since),
            self.store.count_forum_comments(user_id, since),
        )?;

        Ok(ActivitySignals {
            valuation_count,
            total_expenses,
            average_price: average_price.unwrap_or(0.0),
            forum_post_count,
            forum_comment_count,
        })
    }
}
