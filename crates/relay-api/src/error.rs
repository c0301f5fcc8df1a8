//! 통합 API 에러 응답 타입.
//!
//! 파이프라인/게이트웨이 에러를 HTTP 상태 코드와 일관된 JSON 형식으로 변환합니다.
//!
//! | 에러                  | 상태 |
//! |-----------------------|------|
//! | Validation            | 422  |
//! | QuoteUnavailable      | 404  |
//! | QuantityUnresolved    | 400  |
//! | OrderRejected         | 400  |
//! | Auth / Configuration  | 503  |
//! | Transport             | 502  |

use axum::http::StatusCode;
use axum::Json;
use relay_exchange::ExchangeError;
use relay_execution::ExecutionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 통합 API 에러 응답.
///
/// ```json
/// {
///   "code": "ORDER_REJECTED",
///   "message": "주문가능금액을 초과했습니다",
///   "details": { "msg_cd": "APBK0952" },
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "VALIDATION_ERROR", "QUOTE_UNAVAILABLE")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// API 핸들러 에러 타입.
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

/// 422 입력 검증 에러.
pub fn validation_error(message: impl Into<String>) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiErrorResponse::new("VALIDATION_ERROR", message)),
    )
}

/// 404 조회 대상 없음.
pub fn not_found(code: &str, message: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ApiErrorResponse::new(code, message)),
    )
}

/// 파이프라인 에러를 HTTP 응답으로 변환.
pub fn execution_error(err: ExecutionError) -> ApiError {
    let message = err.to_string();
    let (status, body) = match err {
        ExecutionError::Validation(reason) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiErrorResponse::new("VALIDATION_ERROR", reason),
        ),
        ExecutionError::QuoteUnavailable { symbol, reason } => (
            StatusCode::NOT_FOUND,
            ApiErrorResponse::with_details(
                "QUOTE_UNAVAILABLE",
                message,
                serde_json::json!({ "symbol": symbol, "reason": reason }),
            ),
        ),
        ExecutionError::QuantityUnresolved { symbol, reason } => (
            StatusCode::BAD_REQUEST,
            ApiErrorResponse::with_details(
                "QUANTITY_UNRESOLVED",
                message,
                serde_json::json!({ "symbol": symbol, "reason": reason }),
            ),
        ),
        ExecutionError::OrderRejected { code, message } => (
            StatusCode::BAD_REQUEST,
            ApiErrorResponse::with_details(
                "ORDER_REJECTED",
                message,
                serde_json::json!({ "msg_cd": code }),
            ),
        ),
        ExecutionError::Auth(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorResponse::new("BROKER_UNAUTHORIZED", message),
        ),
        ExecutionError::Configuration(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorResponse::new("CONFIGURATION_ERROR", message),
        ),
        ExecutionError::Transport(_) => (
            StatusCode::BAD_GATEWAY,
            ApiErrorResponse::new("BROKER_UNAVAILABLE", message),
        ),
    };
    (status, Json(body))
}

/// 게이트웨이 에러를 HTTP 응답으로 변환.
pub fn exchange_error(err: ExchangeError) -> ApiError {
    execution_error(ExecutionError::from(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ExecutionError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ExecutionError::QuoteUnavailable {
                    symbol: "AAPL".into(),
                    reason: "empty".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ExecutionError::QuantityUnresolved {
                    symbol: "AAPL".into(),
                    reason: "0".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                ExecutionError::OrderRejected {
                    code: "APBK0952".into(),
                    message: "rejected".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (ExecutionError::Auth("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ExecutionError::Configuration("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ExecutionError::Transport("x".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            let (status, _) = execution_error(err);
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn test_rejection_carries_broker_code() {
        let (_, Json(body)) = execution_error(ExecutionError::OrderRejected {
            code: "APBK0952".into(),
            message: "주문가능금액 초과".into(),
        });
        assert_eq!(body.code, "ORDER_REJECTED");
        assert_eq!(body.message, "주문가능금액 초과");
        assert_eq!(body.details.unwrap()["msg_cd"], "APBK0952");
    }

    #[test]
    fn test_exchange_error_timeout_is_bad_gateway() {
        let (status, _) = exchange_error(ExchangeError::Timeout("5s".into()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_json_omits_empty_details() {
        let json = serde_json::to_string(&ApiErrorResponse::new("NOT_FOUND", "x")).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains(r#""code":"NOT_FOUND""#));
    }
}
