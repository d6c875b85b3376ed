use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::provider::ChallengeProvider;

pub struct AppState {
    pub provider: Arc<dyn ChallengeProvider>,
    pub key: Option<String>,
}

#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

/// Body of `/present` and `/cleanup`, as sent by lego's httpreq provider in
/// RAW mode.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeRequest {
    domain: String,
    #[serde(default)]
    token: String,
    key_auth: String,
}

#[derive(Clone, Copy)]
enum Action {
    Present,
    CleanUp,
}

impl Action {
    fn name(self) -> &'static str {
        match self {
            Action::Present => "present",
            Action::CleanUp => "cleanup",
        }
    }
}

pub fn create_router(provider: Arc<dyn ChallengeProvider>, key: Option<String>) -> Router {
    let state = Arc::new(AppState { provider, key });

    // Key check runs before the body is parsed.
    let challenges = Router::new()
        .route("/present", post(present))
        .route("/cleanup", post(cleanup))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_key));

    Router::new()
        .merge(challenges)
        .route("/health", get(health_check))
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}

async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    // Query strings may carry the access key, so only the path is logged.
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("-").trim().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration = start.elapsed();

    // Access log format: method path "user-agent" ip status duration
    info!(
        target: "access",
        "{} {} \"{}\" {} {} {:.3}ms",
        method, path, user_agent, ip, status, duration.as_secs_f64() * 1000.0
    );

    response
}

async fn require_key(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    // Verify access key (if configured)
    if let Some(ref config_key) = state.key {
        let request_key = Query::<KeyQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(q)| q.key)
            .unwrap_or_default();
        if request_key != *config_key {
            warn!("Invalid key for {}", request.uri().path());
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    success: false,
                    error: "Invalid key".to_string(),
                }),
            )
                .into_response();
        }
    }

    next.run(request).await
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

async fn present(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChallengeRequest>,
) -> Response {
    handle(state, body, Action::Present).await
}

async fn cleanup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChallengeRequest>,
) -> Response {
    handle(state, body, Action::CleanUp).await
}

async fn handle(state: Arc<AppState>, body: ChallengeRequest, action: Action) -> Response {
    let result = match action {
        Action::Present => {
            state
                .provider
                .present(&body.domain, &body.token, &body.key_auth)
                .await
        }
        Action::CleanUp => {
            state
                .provider
                .cleanup(&body.domain, &body.token, &body.key_auth)
                .await
        }
    };

    match result {
        Ok(()) => {
            info!("Challenge {} succeeded for {}", action.name(), body.domain);
            (
                StatusCode::OK,
                Json(ApiResponse {
                    success: true,
                    message: format!("Challenge {} succeeded for {}", action.name(), body.domain),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Challenge {} failed for {}: {}", action.name(), body.domain, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
