use anyhow::{Context, Result};
use serde::Deserialize;
use std::io;
use std::path::Path;

use crate::scoring::ScoringConfig;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArtpreneurConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub scoring: ScoringConfig,
}

impl ArtpreneurConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::from_toml(&content)
    }

    /// Like [`Self::load`], but a missing file yields defaults with env overrides.
    /// A file that exists and fails to read, parse or validate is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("Config file {} not found, using defaults", path.as_ref().display());
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg.scoring.validate().context("Invalid [scoring] section")?;
                Ok(cfg)
            }
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read config file: {}", path.as_ref().display())),
        }
    }

    fn from_toml(content: &str) -> Result<Self> {
        let mut config: ArtpreneurConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        config.scoring.validate().context("Invalid [scoring] section")?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ARTPRENEUR_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("ARTPRENEUR_PORT") {
            if let Ok(n) = v.parse() {
                self.server.port = n;
            }
        }
        if let Ok(v) = std::env::var("ARTPRENEUR_DB_PATH") {
            self.database.path = v;
        }
        if let Ok(v) = std::env::var("ARTPRENEUR_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = std::env::var("ARTPRENEUR_JWT_AUDIENCE") {
            // An empty value disables the audience check
            self.auth.audience = if v.is_empty() { None } else { Some(v) };
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "artpreneur.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared with the auth service that issues access tokens.
    pub jwt_secret: String,
    /// Required `aud` claim. `None` skips the audience check.
    pub audience: Option<String>,
    /// Lifetime of tokens minted by `artpreneur token`.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            audience: Some("authenticated".to_string()),
            token_ttl_secs: 3600,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
