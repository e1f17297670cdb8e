use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request},
    middleware,
    middleware::Next,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{accounts, autorun, jobs, schedules};

fn build_localhost_cors(api_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_api_router(state: AppState) -> Router {
    let api_port = state.api_port;

    Router::new()
        .route(
            "/api/jobs",
            get(jobs::get_jobs_endpoint)
                .post(jobs::submit_job_endpoint)
                .delete(jobs::cancel_all_jobs_endpoint),
        )
        .route("/api/jobs/bulk", post(jobs::submit_bulk_endpoint))
        .route("/api/jobs/{job_id}", delete(jobs::cancel_job_endpoint))
        .route("/api/autorun", get(autorun::get_autorun_endpoint))
        .route("/api/autorun/start", post(autorun::start_autorun_endpoint))
        .route("/api/autorun/pause", post(autorun::pause_autorun_endpoint))
        .route(
            "/api/autorun/resume",
            post(autorun::resume_autorun_endpoint),
        )
        .route(
            "/api/autorun/cancel",
            post(autorun::cancel_autorun_endpoint),
        )
        .route("/api/autorun/reset", post(autorun::reset_autorun_endpoint))
        .route(
            "/api/schedules",
            get(schedules::get_schedules_endpoint).post(schedules::create_schedule_endpoint),
        )
        .route(
            "/api/schedules/{schedule_id}",
            delete(schedules::delete_schedule_endpoint)
                .patch(schedules::update_schedule_endpoint),
        )
        .route(
            "/api/schedules/{schedule_id}/toggle",
            post(schedules::toggle_schedule_endpoint),
        )
        .route("/api/accounts", get(accounts::get_accounts_endpoint))
        .route("/api/events", get(super::sse_events_endpoint))
        .route("/api/logs", get(super::sse_logs_endpoint))
        .layer(middleware::from_fn(security_headers))
        .layer(build_localhost_cors(api_port))
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    response
}
