use axum::{
    Json,
    extract::{Path, State},
};

use super::super::AppState;
use crate::core::calendar::parse_time_of_day;

pub async fn get_schedules_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let entries = state.calendar.list().await;
    Json(serde_json::json!({ "success": true, "schedules": entries }))
}

#[derive(serde::Deserialize)]
pub struct CreateScheduleRequest {
    /// "HH:MM" in the daemon's local reference time.
    pub time_of_day: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub async fn create_schedule_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<CreateScheduleRequest>,
) -> Json<serde_json::Value> {
    let time_of_day = match parse_time_of_day(&payload.time_of_day) {
        Ok(t) => t,
        Err(e) => {
            return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
        }
    };
    let entry = state.calendar.create(time_of_day, payload.enabled).await;
    Json(serde_json::json!({
        "success": true,
        "message": "Schedule added",
        "schedule": entry
    }))
}

#[derive(serde::Deserialize)]
pub struct UpdateScheduleRequest {
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

pub async fn update_schedule_endpoint(
    Path(schedule_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateScheduleRequest>,
) -> Json<serde_json::Value> {
    let time_of_day = match payload.time_of_day.as_deref().map(parse_time_of_day) {
        Some(Ok(t)) => Some(t),
        Some(Err(e)) => {
            return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
        }
        None => None,
    };
    match state
        .calendar
        .update(&schedule_id, time_of_day, payload.enabled)
        .await
    {
        Ok(entry) => Json(serde_json::json!({
            "success": true,
            "message": "Schedule updated",
            "schedule": entry
        })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn delete_schedule_endpoint(
    Path(schedule_id): Path<String>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    match state.calendar.delete(&schedule_id).await {
        Ok(()) => Json(serde_json::json!({ "success": true, "message": "Schedule removed" })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn toggle_schedule_endpoint(
    Path(schedule_id): Path<String>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    match state.calendar.toggle(&schedule_id).await {
        Ok(entry) => Json(serde_json::json!({ "success": true, "schedule": entry })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}
