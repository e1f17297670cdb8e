use axum::{
    Json,
    extract::{Path, State},
};

use super::super::AppState;
use crate::core::jobs::engine::BulkItem;
use crate::core::jobs::{JobPayload, ReplyPayload, SubmitOptions};

pub async fn get_jobs_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (jobs, summary) = state.engine.snapshot().await;
    Json(serde_json::json!({
        "success": true,
        "jobs": jobs,
        "summary": summary
    }))
}

#[derive(serde::Deserialize)]
pub struct SubmitJobRequest {
    #[serde(flatten)]
    pub payload: JobPayload,
    #[serde(default)]
    pub options: SubmitOptions,
}

pub async fn submit_job_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<SubmitJobRequest>,
) -> Json<serde_json::Value> {
    match state.engine.submit(payload.payload, payload.options).await {
        Ok(job) => Json(serde_json::json!({ "success": true, "job": job })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

#[derive(serde::Deserialize)]
pub struct SubmitBulkRequest {
    pub items: Vec<ReplyPayload>,
    /// Inter-send spacing override, seconds. Falls back to the configured
    /// raid spacing when absent.
    #[serde(default)]
    pub delay_secs: Option<(u64, u64)>,
}

pub async fn submit_bulk_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<SubmitBulkRequest>,
) -> Json<serde_json::Value> {
    let delay = payload.delay_secs.unwrap_or(state.raid_spacing());
    let items: Vec<BulkItem> = payload
        .items
        .into_iter()
        .map(|p| BulkItem {
            payload: p,
            options: SubmitOptions::default(),
        })
        .collect();

    match state.engine.submit_bulk(items, delay).await {
        Ok(jobs) => {
            let count = jobs.len();
            Json(serde_json::json!({
                "success": true,
                "jobs": jobs,
                "count": count
            }))
        }
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn cancel_job_endpoint(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    match state.engine.cancel(&job_id).await {
        Ok(job) => Json(serde_json::json!({ "success": true, "job": job })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn cancel_all_jobs_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cancelled = state.engine.cancel_all().await;
    Json(serde_json::json!({ "success": true, "cancelled": cancelled }))
}
