use axum::{Json, extract::State};

use super::super::AppState;
use crate::core::autorun::StartOptions;

pub async fn get_autorun_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.autorun.snapshot().await;
    Json(serde_json::json!({ "success": true, "autorun": snapshot }))
}

pub async fn start_autorun_endpoint(
    State(state): State<AppState>,
    payload: Option<Json<StartOptions>>,
) -> Json<serde_json::Value> {
    let opts = payload.map(|Json(o)| o).unwrap_or_default();
    match state.autorun.start(opts).await {
        Ok(()) => Json(serde_json::json!({ "success": true, "message": "Auto-run started" })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn pause_autorun_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.autorun.pause().await {
        Ok(()) => Json(serde_json::json!({ "success": true, "message": "Auto-run paused" })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn resume_autorun_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.autorun.resume().await {
        Ok(()) => Json(serde_json::json!({ "success": true, "message": "Auto-run resumed" })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn cancel_autorun_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.autorun.cancel().await {
        Ok(()) => Json(serde_json::json!({ "success": true, "message": "Auto-run cancelled" })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn reset_autorun_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.autorun.reset().await {
        Ok(()) => Json(serde_json::json!({ "success": true, "message": "Auto-run reset" })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}
