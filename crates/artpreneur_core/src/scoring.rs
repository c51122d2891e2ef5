//! Creative Health Score arithmetic.
//!
//! Pure functions only: the engine gathers [`ActivitySignals`] from the store
//! and hands them here together with a [`ScoringConfig`].

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Upper bound of every score.
pub const MAX_SCORE: u32 = 100;

/// Longest accepted activity window (ten years).
pub const MAX_WINDOW_DAYS: u32 = 3650;

// ============================================================================
// Configuration
// ============================================================================

/// Weights applied to the four sub-scores when computing the overall score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub productivity: f64,
    pub financial_health: f64,
    pub learning_engagement: f64,
    pub community_participation: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            productivity: 0.30,
            financial_health: 0.30,
            learning_engagement: 0.20,
            community_participation: 0.20,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.productivity + self.financial_health + self.learning_engagement + self.community_participation
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Length of the trailing activity window.
    pub window_days: u32,
    pub points_per_valuation: u32,
    pub points_per_forum_post: u32,
    pub points_per_forum_comment: u32,
    /// Financial score used when there is no pricing activity in the window.
    pub neutral_financial_score: f64,
    /// No learning signal is tracked yet; this value is reported as-is.
    pub learning_engagement_score: u32,
    pub weights: ScoreWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            points_per_valuation: 20,
            points_per_forum_post: 15,
            points_per_forum_comment: 5,
            neutral_financial_score: 50.0,
            learning_engagement_score: 50,
            weights: ScoreWeights::default(),
        }
    }
}

impl ScoringConfig {
    /// Reject configurations that could push the overall score out of [0, 100].
    pub fn validate(&self) -> Result<()> {
        if self.window_days == 0 || self.window_days > MAX_WINDOW_DAYS {
            bail!("scoring.window_days must be within 1..={}", MAX_WINDOW_DAYS);
        }
        let w = &self.weights;
        let all = [
            w.productivity,
            w.financial_health,
            w.learning_engagement,
            w.community_participation,
        ];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            bail!("scoring weights must be finite and non-negative");
        }
        if (w.sum() - 1.0).abs() > 1e-6 {
            bail!("scoring weights must sum to 1.0 (got {})", w.sum());
        }
        if !(0.0..=100.0).contains(&self.neutral_financial_score) {
            bail!("scoring.neutral_financial_score must be within [0, 100]");
        }
        if self.learning_engagement_score > MAX_SCORE {
            bail!("scoring.learning_engagement_score must be within [0, 100]");
        }
        Ok(())
    }
}

// ============================================================================
// Inputs and outputs
// ============================================================================

/// Raw activity aggregates for one user over the window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivitySignals {
    pub valuation_count: u64,
    pub total_expenses: f64,
    /// Mean recommended price; 0 when there were no pricing calculations.
    pub average_price: f64,
    pub forum_post_count: u64,
    pub forum_comment_count: u64,
}

/// The five scores returned to the caller and stored per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScores {
    pub overall_score: u32,
    pub productivity_score: u32,
    pub financial_health_score: f64,
    pub learning_engagement_score: u32,
    pub community_participation_score: u32,
}

impl HealthScores {
    pub fn compute(signals: &ActivitySignals, config: &ScoringConfig) -> Self {
        let productivity_score = saturating_points(signals.valuation_count, config.points_per_valuation);
        let financial_health_score = financial_health(
            signals.average_price,
            signals.total_expenses,
            config.neutral_financial_score,
        );
        let learning_engagement_score = config.learning_engagement_score.min(MAX_SCORE);
        let community_participation_score = community_participation(
            signals.forum_post_count,
            signals.forum_comment_count,
            config,
        );

        let w = &config.weights;
        let weighted = productivity_score as f64 * w.productivity
            + financial_health_score * w.financial_health
            + learning_engagement_score as f64 * w.learning_engagement
            + community_participation_score as f64 * w.community_participation;

        Self {
            overall_score: weighted.round() as u32,
            productivity_score,
            financial_health_score,
            learning_engagement_score,
            community_participation_score,
        }
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.overall_score)
    }
}

fn saturating_points(count: u64, points: u32) -> u32 {
    count.saturating_mul(points as u64).min(MAX_SCORE as u64) as u32
}

/// Share of the typical recommended price left after the window's expenses.
pub fn financial_health(average_price: f64, total_expenses: f64, neutral: f64) -> f64 {
    if average_price > 0.0 {
        let ratio = (average_price - total_expenses) / average_price * 100.0;
        if ratio.is_nan() {
            return 0.0;
        }
        ratio.clamp(0.0, 100.0)
    } else {
        neutral
    }
}

fn community_participation(posts: u64, comments: u64, config: &ScoringConfig) -> u32 {
    let points = posts
        .saturating_mul(config.points_per_forum_post as u64)
        .saturating_add(comments.saturating_mul(config.points_per_forum_comment as u64));
    points.min(MAX_SCORE as u64) as u32
}

// ============================================================================
// Bands
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    NeedsAttention,
}

impl ScoreBand {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 70 => Self::Excellent,
            s if s >= 40 => Self::Good,
            _ => Self::NeedsAttention,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::NeedsAttention => "Needs Attention",
        }
    }
}
