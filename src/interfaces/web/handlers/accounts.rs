use axum::{Json, extract::State};

use super::super::AppState;

/// Account names and availability only; cookies never leave the daemon.
pub async fn get_accounts_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "accounts": state.accounts.all()
    }))
}
