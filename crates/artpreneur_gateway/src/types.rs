use artpreneur_core::{HealthScoreRecord, HealthScores};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of a successful `calculate-health-score` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub success: bool,
    pub scores: HealthScores,
}

/// Body of `GET /functions/v1/health-score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentScoreResponse {
    pub scores: StoredScores,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredScores {
    #[serde(flatten)]
    pub scores: HealthScores,
    pub last_calculated_at: DateTime<Utc>,
    /// Display label of the overall score band.
    pub band: String,
}

impl From<HealthScoreRecord> for StoredScores {
    fn from(record: HealthScoreRecord) -> Self {
        let band = record.band().label().to_string();
        Self {
            scores: record.scores,
            last_calculated_at: record.last_calculated_at,
            band,
        }
    }
}

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
