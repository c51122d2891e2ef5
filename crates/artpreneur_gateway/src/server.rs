use crate::auth::bearer_token;
use crate::types::{CalculateResponse, CurrentScoreResponse, ErrorBody};
use artpreneur_core::{HealthScoreEngine, HealthScoreError, IdentityResolver};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub engine: HealthScoreEngine,
    pub identity: Arc<dyn IdentityResolver>,
}

/// The health score HTTP server.
///
/// - `POST /functions/v1/calculate-health-score`: recompute and store
/// - `GET /functions/v1/health-score`: last stored score
/// - `GET /health`: health check
pub struct GatewayServer {
    state: AppState,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(
        engine: HealthScoreEngine,
        identity: Arc<dyn IdentityResolver>,
        host: &str,
        port: u16,
    ) -> Self {
        Self {
            state: AppState { engine, identity },
            host: host.to_string(),
            port,
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Bind and serve until the listener fails.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("Gateway failed to bind {}: {}", addr, e))?;
        tracing::info!("Gateway listening on {}", addr);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/functions/v1/calculate-health-score",
            post(calculate_health_score),
        )
        .route("/functions/v1/health-score", get(current_health_score))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

pub enum ApiError {
    Score(HealthScoreError),
    NotFound(String),
}

impl From<HealthScoreError> for ApiError {
    fn from(err: HealthScoreError) -> Self {
        Self::Score(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Score(err) => {
                let status = if err.is_authentication() {
                    StatusCode::UNAUTHORIZED
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Uuid, HealthScoreError> {
    let resolved = match bearer_token(headers) {
        Ok(token) => state.identity.resolve(token).await,
        Err(e) => Err(e),
    };
    if let Err(ref e) = resolved {
        tracing::warn!(kind = e.kind(), "Rejected health score request: {}", e);
    }
    resolved
}

/// POST /functions/v1/calculate-health-score
///
/// No body is read; the user comes from the bearer token.
async fn calculate_health_score(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CalculateResponse>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let scores = state.engine.calculate(user_id).await?;
    Ok(Json(CalculateResponse {
        success: true,
        scores,
    }))
}

/// GET /functions/v1/health-score
async fn current_health_score(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CurrentScoreResponse>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    match state.engine.current(user_id).await? {
        Some(record) => Ok(Json(CurrentScoreResponse {
            scores: record.into(),
        })),
        None => Err(ApiError::NotFound(
            "No health score calculated yet".to_string(),
        )),
    }
}
