// handlers/public/health.rs - GET /health handler
use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// Liveness plus a check that the store location is a directory
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let now = chrono::Utc::now();
    let location = &state.config.storage.location;

    match tokio::fs::metadata(location).await {
        Ok(meta) if meta.is_dir() => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "storage": "ok",
                    "version": env!("CARGO_PKG_VERSION"),
                }
            })),
        ),
        other => {
            let reason = match other {
                Ok(_) => "not a directory".to_string(),
                Err(e) => e.to_string(),
            };
            tracing::warn!("Storage location {} unavailable: {}", location.display(), reason);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "storage unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "storage_error": reason,
                    }
                })),
            )
        }
    }
}
