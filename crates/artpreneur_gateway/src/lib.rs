pub mod auth;
pub mod server;
pub mod types;

pub use auth::{bearer_token, Claims, JwtIdentity};
pub use server::{router, AppState, GatewayServer};
pub use types::{CalculateResponse, CurrentScoreResponse, ErrorBody, StoredScores};
