//! In-memory activity store. Deterministic and fault-injectable, for tests
//! and local runs without a database.

use crate::{ActivityStore, HealthScoreRecord, HealthScores};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// The activity tables a read can target. Used to inject read failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivitySource {
    Valuations,
    Expenses,
    PricingCalculations,
    ForumPosts,
    ForumComments,
}

#[derive(Default)]
struct Tables {
    valuations: Vec<(Uuid, DateTime<Utc>)>,
    expenses: Vec<(Uuid, f64, NaiveDate)>,
    pricing: Vec<(Uuid, f64, DateTime<Utc>)>,
    posts: Vec<(Uuid, DateTime<Utc>)>,
    comments: Vec<(Uuid, DateTime<Utc>)>,
    scores: HashMap<Uuid, HealthScoreRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing_reads: RwLock<HashSet<ActivitySource>>,
    fail_writes: RwLock<bool>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_valuation(&self, user_id: Uuid, created_at: DateTime<Utc>) {
        self.tables.write().await.valuations.push((user_id, created_at));
    }

    pub async fn add_expense(&self, user_id: Uuid, amount: f64, date: NaiveDate) {
        self.tables.write().await.expenses.push((user_id, amount, date));
    }

    pub async fn add_pricing_calculation(
        &self,
        user_id: Uuid,
        recommended_price: f64,
        created_at: DateTime<Utc>,
    ) {
        self.tables
            .write()
            .await
            .pricing
            .push((user_id, recommended_price, created_at));
    }

    pub async fn add_forum_post(&self, user_id: Uuid, created_at: DateTime<Utc>) {
        self.tables.write().await.posts.push((user_id, created_at));
    }

    pub async fn add_forum_comment(&self, user_id: Uuid, created_at: DateTime<Utc>) {
        self.tables.write().await.comments.push((user_id, created_at));
    }

    /// Make every subsequent read of `source` fail.
    pub async fn fail_reads(&self, source: ActivitySource) {
        self.failing_reads.write().await.insert(source);
    }

    /// Make every subsequent health score write fail.
    pub async fn fail_writes(&self) {
        *self.fail_writes.write().await = true;
    }

    /// Number of successful health score writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn health_score_rows(&self) -> usize {
        self.tables.read().await.scores.len()
    }

    async fn check_read(&self, source: ActivitySource) -> Result<()> {
        if self.failing_reads.read().await.contains(&source) {
            bail!("injected read failure on {:?}", source);
        }
        Ok(())
    }
}

fn count_since(rows: &[(Uuid, DateTime<Utc>)], user_id: Uuid, since: DateTime<Utc>) -> u64 {
    rows.iter()
        .filter(|(uid, at)| *uid == user_id && *at >= since)
        .count() as u64
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn count_valuations(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        self.check_read(ActivitySource::Valuations).await?;
        Ok(count_since(&self.tables.read().await.valuations, user_id, since))
    }

    async fn total_expenses(&self, user_id: Uuid, since: NaiveDate) -> Result<f64> {
        self.check_read(ActivitySource::Expenses).await?;
        let tables = self.tables.read().await;
        Ok(tables
            .expenses
            .iter()
            .filter(|(uid, _, date)| *uid == user_id && *date >= since)
            .map(|(_, amount, _)| amount)
            .sum())
    }

    async fn average_recommended_price(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        self.check_read(ActivitySource::PricingCalculations).await?;
        let tables = self.tables.read().await;
        let prices: Vec<f64> = tables
            .pricing
            .iter()
            .filter(|(uid, _, at)| *uid == user_id && *at >= since)
            .map(|(_, price, _)| *price)
            .collect();
        if prices.is_empty() {
            return Ok(None);
        }
        Ok(Some(prices.iter().sum::<f64>() / prices.len() as f64))
    }

    async fn count_forum_posts(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        self.check_read(ActivitySource::ForumPosts).await?;
        Ok(count_since(&self.tables.read().await.posts, user_id, since))
    }

    async fn count_forum_comments(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        self.check_read(ActivitySource::ForumComments).await?;
        Ok(count_since(&self.tables.read().await.comments, user_id, since))
    }

    async fn upsert_health_score(
        &self,
        user_id: Uuid,
        scores: &HealthScores,
        calculated_at: DateTime<Utc>,
    ) -> Result<()> {
        if *self.fail_writes.read().await {
            bail!("injected write failure");
        }
        self.tables.write().await.scores.insert(
            user_id,
            HealthScoreRecord {
                user_id,
                scores: scores.clone(),
                last_calculated_at: calculated_at,
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_health_score(&self, user_id: Uuid) -> Result<Option<HealthScoreRecord>> {
        Ok(self.tables.read().await.scores.get(&user_id).cloned())
    }
}
