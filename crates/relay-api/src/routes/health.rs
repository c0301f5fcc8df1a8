//! 헬스 체크 endpoint.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// 헬스 체크 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 전체 상태 ("healthy" | "degraded")
    pub status: String,
    /// API 버전
    pub version: String,
    /// 서버 업타임(초)
    pub uptime_secs: i64,
    /// 현재 시간 (ISO 8601)
    pub timestamp: String,
    /// 브로커 세션 상태
    pub broker_session: ComponentStatus,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// 상태 ("up" | "down" | "not_configured")
    pub status: String,
    /// 추가 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    fn new(status: &str, message: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            message,
        }
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /health/ready
///
/// 브로커 세션이 인증되어 있어야 준비 상태입니다.
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status_code, session) = match &state.oauth {
        Some(oauth) if oauth.is_authenticated().await => {
            let expires = oauth
                .token_expires_at()
                .await
                .map(|at| format!("token expires at {}", at.to_rfc3339()));
            (StatusCode::OK, ComponentStatus::new("up", expires))
        }
        Some(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ComponentStatus::new("down", Some("세션 미인증".to_string())),
        ),
        None => (StatusCode::OK, ComponentStatus::new("not_configured", None)),
    };

    let response = HealthResponse {
        status: if status_code == StatusCode::OK {
            "healthy"
        } else {
            "degraded"
        }
        .to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        broker_session: session,
    };

    (status_code, Json(response))
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
