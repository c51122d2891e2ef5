use anyhow::{Context, Result};
use artpreneur_core::{ActivityStore, HealthScoreRecord, HealthScores};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref().display().to_string();
        let db_url = format!("sqlite://{}?mode=rwc", path);

        let mut options = SqlitePoolOptions::new().after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                Ok(())
            })
        });
        // Every connection to ":memory:" is its own database, so keep exactly one alive
        if path == ":memory:" {
            options = options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = options
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!("SQLite store ready at {}", path);
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // === Activity tables (written by the dashboard's CRUD forms) ===

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS art_valuations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create art_valuations table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS expenses (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL DEFAULT 'other',
                date TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create expenses table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pricing_calculations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                recommended_price REAL NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create pricing_calculations table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS forum_posts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create forum_posts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS forum_comments (
                id TEXT PRIMARY KEY,
                post_id TEXT,
                user_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY(post_id) REFERENCES forum_posts(id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create forum_comments table")?;

        for (name, ddl) in [
            (
                "idx_art_valuations_user_created",
                "CREATE INDEX IF NOT EXISTS idx_art_valuations_user_created ON art_valuations(user_id, created_at)",
            ),
            (
                "idx_expenses_user_date",
                "CREATE INDEX IF NOT EXISTS idx_expenses_user_date ON expenses(user_id, date)",
            ),
            (
                "idx_pricing_user_created",
                "CREATE INDEX IF NOT EXISTS idx_pricing_user_created ON pricing_calculations(user_id, created_at)",
            ),
            (
                "idx_forum_posts_user_created",
                "CREATE INDEX IF NOT EXISTS idx_forum_posts_user_created ON forum_posts(user_id, created_at)",
            ),
            (
                "idx_forum_comments_user_created",
                "CREATE INDEX IF NOT EXISTS idx_forum_comments_user_created ON forum_comments(user_id, created_at)",
            ),
        ] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create index {}", name))?;
        }

        // === Health scores (one row per user) ===
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS creative_health_scores (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL UNIQUE,
                overall_score INTEGER NOT NULL CHECK (overall_score BETWEEN 0 AND 100),
                productivity_score INTEGER NOT NULL CHECK (productivity_score BETWEEN 0 AND 100),
                financial_health_score REAL NOT NULL CHECK (financial_health_score BETWEEN 0 AND 100),
                learning_engagement_score INTEGER NOT NULL CHECK (learning_engagement_score BETWEEN 0 AND 100),
                community_participation_score INTEGER NOT NULL CHECK (community_participation_score BETWEEN 0 AND 100),
                created_at INTEGER NOT NULL,
                last_calculated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create creative_health_scores table")?;

        Ok(())
    }

    // =========================================================================
    // Activity inserts
    // =========================================================================

    pub async fn record_valuation(&self, user_id: Uuid, created_at: DateTime<Utc>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO art_valuations (id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .bind(created_at.timestamp_millis())
            .execute(&self.pool)
            .await
            .context("Failed to insert art valuation")?;
        Ok(id)
    }

    pub async fn record_expense(
        &self,
        user_id: Uuid,
        amount: f64,
        category: &str,
        date: NaiveDate,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO expenses (id, user_id, amount, category, date, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(amount)
        .bind(category)
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to insert expense")?;
        Ok(id)
    }

    pub async fn record_pricing_calculation(
        &self,
        user_id: Uuid,
        recommended_price: f64,
        created_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO pricing_calculations (id, user_id, recommended_price, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(recommended_price)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to insert pricing calculation")?;
        Ok(id)
    }

    pub async fn record_forum_post(&self, user_id: Uuid, created_at: DateTime<Utc>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO forum_posts (id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .bind(created_at.timestamp_millis())
            .execute(&self.pool)
            .await
            .context("Failed to insert forum post")?;
        Ok(id)
    }

    pub async fn record_forum_comment(
        &self,
        user_id: Uuid,
        post_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO forum_comments (id, post_id, user_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(post_id.map(|p| p.to_string()))
            .bind(user_id.to_string())
            .bind(created_at.timestamp_millis())
            .execute(&self.pool)
            .await
            .context("Failed to insert forum comment")?;
        Ok(id)
    }

    /// Number of stored health score rows (all users).
    pub async fn count_health_scores(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM creative_health_scores")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count health scores")?;
        Ok(count)
    }

    /// Close the pool. Later queries fail, which tests use to simulate an outage.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn count_since(&self, table: &str, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = ? AND created_at >= ?",
            table
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(user_id.to_string())
            .bind(since.timestamp_millis())
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count rows in {}", table))?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl ActivityStore for SqliteStore {
    async fn count_valuations(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        self.count_since("art_valuations", user_id, since).await
    }

    async fn total_expenses(&self, user_id: Uuid, since: NaiveDate) -> Result<f64> {
        // TOTAL() is 0.0 on an empty set, unlike SUM()
        let total: f64 = sqlx::query_scalar("SELECT TOTAL(amount) FROM expenses WHERE user_id = ? AND date >= ?")
            .bind(user_id.to_string())
            .bind(since.format(DATE_FORMAT).to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to sum expenses")?;
        Ok(total)
    }

    async fn average_recommended_price(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        let avg: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(recommended_price) FROM pricing_calculations WHERE user_id = ? AND created_at >= ?",
        )
        .bind(user_id.to_string())
        .bind(since.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .context("Failed to average pricing calculations")?;
        Ok(avg)
    }

    async fn count_forum_posts(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        self.count_since("forum_posts", user_id, since).await
    }

    async fn count_forum_comments(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        self.count_since("forum_comments", user_id, since).await
    }

    async fn upsert_health_score(
        &self,
        user_id: Uuid,
        scores: &HealthScores,
        calculated_at: DateTime<Utc>,
    ) -> Result<()> {
        let at = calculated_at.timestamp_millis();
        sqlx::query(
            "INSERT INTO creative_health_scores
                (id, user_id, overall_score, productivity_score, financial_health_score,
                 learning_engagement_score, community_participation_score, created_at, last_calculated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                overall_score = excluded.overall_score,
                productivity_score = excluded.productivity_score,
                financial_health_score = excluded.financial_health_score,
                learning_engagement_score = excluded.learning_engagement_score,
                community_participation_score = excluded.community_participation_score,
                last_calculated_at = excluded.last_calculated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.to_string())
        .bind(scores.overall_score as i64)
        .bind(scores.productivity_score as i64)
        .bind(scores.financial_health_score)
        .bind(scores.learning_engagement_score as i64)
        .bind(scores.community_participation_score as i64)
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert creative health score")?;

        tracing::debug!("Health score saved for {}", user_id);
        Ok(())
    }

    async fn load_health_score(&self, user_id: Uuid) -> Result<Option<HealthScoreRecord>> {
        let row = sqlx::query(
            "SELECT overall_score, productivity_score, financial_health_score,
                    learning_engagement_score, community_participation_score, last_calculated_at
             FROM creative_health_scores WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query creative_health_scores")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let millis: i64 = row.get("last_calculated_at");
        let last_calculated_at = DateTime::<Utc>::from_timestamp_millis(millis)
            .with_context(|| format!("Invalid last_calculated_at timestamp: {}", millis))?;

        Ok(Some(HealthScoreRecord {
            user_id,
            scores: HealthScores {
                overall_score: row.get::<i64, _>("overall_score") as u32,
                productivity_score: row.get::<i64, _>("productivity_score") as u32,
                financial_health_score: row.get("financial_health_score"),
                learning_engagement_score: row.get::<i64, _>("learning_engagement_score") as u32,
                community_participation_score: row.get::<i64, _>("community_participation_score") as u32,
            },
            last_calculated_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn scores(overall: u32) -> HealthScores {
        HealthScores {
            overall_score: overall,
            productivity_score: 20,
            financial_health_score: 62.5,
            learning_engagement_score: 50,
            community_participation_score: 5,
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let store = SqliteStore::new(":memory:").await.expect("Failed to open store");
        let user = Uuid::new_v4();
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t2 = t1 + Duration::hours(6);

        assert!(store.load_health_score(user).await.unwrap().is_none());

        store.upsert_health_score(user, &scores(30), t1).await.unwrap();
        let first = store.load_health_score(user).await.unwrap().unwrap();
        assert_eq!(first.scores, scores(30));
        assert_eq!(first.last_calculated_at, t1);

        store.upsert_health_score(user, &scores(45), t2).await.unwrap();
        let second = store.load_health_score(user).await.unwrap().unwrap();
        assert_eq!(second.scores.overall_score, 45);
        assert_eq!(second.last_calculated_at, t2);
        assert_eq!(store.count_health_scores().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_keeps_row_identity() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let user = Uuid::new_v4();
        store.upsert_health_score(user, &scores(10), Utc::now()).await.unwrap();
        let id_before: String = sqlx::query_scalar("SELECT id FROM creative_health_scores WHERE user_id = ?")
            .bind(user.to_string())
            .fetch_one(&store.pool)
            .await
            .unwrap();

        store.upsert_health_score(user, &scores(20), Utc::now()).await.unwrap();
        let id_after: String = sqlx::query_scalar("SELECT id FROM creative_health_scores WHERE user_id = ?")
            .bind(user.to_string())
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(id_before, id_after);
    }

    #[tokio::test]
    async fn test_out_of_range_scores_rejected() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let mut bad = scores(10);
        bad.overall_score = 101;
        assert!(store.upsert_health_score(Uuid::new_v4(), &bad, Utc::now()).await.is_err());
        assert_eq!(store.count_health_scores().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_aggregates() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 9, 30, 0).unwrap();
        let since = now - Duration::days(30);

        store.record_valuation(user, now).await.unwrap();
        store.record_valuation(user, since).await.unwrap();
        store.record_valuation(user, since - Duration::seconds(1)).await.unwrap();
        store.record_valuation(other, now).await.unwrap();
        assert_eq!(store.count_valuations(user, since).await.unwrap(), 2);

        assert_eq!(store.total_expenses(user, since.date_naive()).await.unwrap(), 0.0);
        store.record_expense(user, 120.5, "materials", now.date_naive()).await.unwrap();
        store.record_expense(user, 79.5, "studio", since.date_naive()).await.unwrap();
        store
            .record_expense(user, 1000.0, "travel", since.date_naive() - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(store.total_expenses(user, since.date_naive()).await.unwrap(), 200.0);

        assert_eq!(store.average_recommended_price(user, since).await.unwrap(), None);
        store.record_pricing_calculation(user, 500.0, now).await.unwrap();
        store.record_pricing_calculation(user, 1500.0, now).await.unwrap();
        store.record_pricing_calculation(user, 9999.0, since - Duration::days(2)).await.unwrap();
        assert_eq!(store.average_recommended_price(user, since).await.unwrap(), Some(1000.0));

        let post = store.record_forum_post(user, now).await.unwrap();
        store.record_forum_comment(user, Some(post), now).await.unwrap();
        store.record_forum_comment(user, None, now).await.unwrap();
        store.record_forum_comment(other, Some(post), now).await.unwrap();
        assert_eq!(store.count_forum_posts(user, since).await.unwrap(), 1);
        assert_eq!(store.count_forum_comments(user, since).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_window_start_keeps_subsecond_precision() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let user = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 9, 30, 0).unwrap() + Duration::milliseconds(900);
        let since = now - Duration::days(30);

        store.record_valuation(user, since - Duration::milliseconds(500)).await.unwrap();
        store.record_forum_post(user, since - Duration::milliseconds(1)).await.unwrap();
        store.record_pricing_calculation(user, 700.0, since - Duration::milliseconds(500)).await.unwrap();
        assert_eq!(store.count_valuations(user, since).await.unwrap(), 0);
        assert_eq!(store.count_forum_posts(user, since).await.unwrap(), 0);
        assert_eq!(store.average_recommended_price(user, since).await.unwrap(), None);

        store.record_valuation(user, since).await.unwrap();
        assert_eq!(store.count_valuations(user, since).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_calculated_at_roundtrips_millis() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let user = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 6, 15, 9, 30, 0).unwrap() + Duration::milliseconds(250);
        store.upsert_health_score(user, &scores(40), at).await.unwrap();
        let stored = store.load_health_score(user).await.unwrap().unwrap();
        assert_eq!(stored.last_calculated_at, at);
    }

    #[tokio::test]
    async fn test_reads_fail_after_close() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        store.close().await;
        assert!(store.count_valuations(Uuid::new_v4(), Utc::now()).await.is_err());
    }
}
