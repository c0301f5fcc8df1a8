//! 브로커 게이트웨이 에러 타입.

use thiserror::Error;

/// 게이트웨이 관련 에러.
///
/// 세 갈래로 나뉩니다:
/// - 세션: `Configuration`, `Unauthorized`, `NotInitialized`
/// - 전송: `NetworkError`, `Timeout`, `HttpStatus`, `ParseError`, `HashkeyFailed`
/// - 도메인: `ApiError` (HTTP 2xx이지만 `rt_cd != "0"`)
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 자격증명 누락 등 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 토큰 발급 실패
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 세션 초기화 전 토큰 요청
    #[error("Session not initialized")]
    NotInitialized,

    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 2xx가 아닌 HTTP 응답
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 응답 본문 파싱 실패 (잘못된 JSON 또는 예상과 다른 구조)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 해시키 발급 실패로 본 요청 중단
    #[error("Hashkey generation failed: {0}")]
    HashkeyFailed(String),

    /// 브로커가 거부한 요청
    #[error("API error {msg_cd}: {message}")]
    ApiError {
        rt_cd: String,
        msg_cd: String,
        message: String,
    },
}

impl ExchangeError {
    /// 전송 계층 에러인지 확인.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Timeout(_)
                | ExchangeError::HttpStatus { .. }
                | ExchangeError::ParseError(_)
                | ExchangeError::HashkeyFailed(_)
        )
    }

    /// 조회성 요청에 한해 재시도해도 되는 에러인지 확인.
    ///
    /// 주문/취소는 이 값과 무관하게 재시도하지 않습니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::NetworkError(_) | ExchangeError::Timeout(_) => true,
            ExchangeError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// 인증/세션 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ExchangeError::Unauthorized(_) | ExchangeError::NotInitialized
        )
    }

    /// 브로커 도메인 실패인지 확인.
    pub fn is_domain(&self) -> bool {
        matches!(self, ExchangeError::ApiError { .. })
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}
