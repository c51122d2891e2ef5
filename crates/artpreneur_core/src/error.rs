//! Failure taxonomy of a health score invocation.
//!
//! Every variant is terminal: a failed invocation returns no scores and leaves
//! the stored row untouched.

#[derive(Debug, thiserror::Error)]
pub enum HealthScoreError {
    /// The caller's credential was missing or could not be resolved to a user.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// One of the activity reads failed.
    #[error("Failed to read activity data: {0:#}")]
    DataAccess(anyhow::Error),

    /// The health score upsert failed.
    #[error("Failed to persist health score: {0:#}")]
    Persistence(anyhow::Error),

    /// The scoring configuration cannot be applied to this invocation.
    #[error("Invalid scoring configuration: {0}")]
    Configuration(String),
}

impl HealthScoreError {
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::Authentication(reason.into())
    }

    /// Short machine-friendly name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::DataAccess(_) => "data_access",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}
