/// Health check endpoint
///
/// ```text
/// GET /health
/// GET /api/health
/// ```
///
/// ```json
/// { "status": "healthy", "version": "0.1.0", "database": "connected",
///   "pool": { "size": 3, "idle": 2, "in_use": 1 } }
/// ```
///
/// Always 200; a failed `SELECT 1` reports `degraded` so load balancers can
/// tell the process is up while the database is not.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use serde::Serialize;
use swanstudios_shared::db::pool;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub pool: pool::PoolStats,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let connected = match pool::health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    };

    Ok(Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        pool: pool::pool_stats(&state.db),
    }))
}
