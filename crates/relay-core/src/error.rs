//! 릴레이 공통 에러 타입.

use thiserror::Error;

/// 도메인/설정 단계에서 발생하는 에러.
#[derive(Debug, Error)]
pub enum RelayError {
    /// 설정 에러 (시작 시 치명적)
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력 (알 수 없는 거래소 라벨, 주문 방향 등)
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),
}

/// 릴레이 작업을 위한 Result 타입.
pub type RelayResult<T> = Result<T, RelayError>;

impl From<config::ConfigError> for RelayError {
    fn from(err: config::ConfigError) -> Self {
        RelayError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_from_config_crate() {
        let err: RelayError = config::ConfigError::NotFound("server.port".to_string()).into();
        assert!(matches!(err, RelayError::Config(_)));
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_error_message_korean_prefix() {
        let err = RelayError::InvalidInput("LSE".to_string());
        assert_eq!(err.to_string(), "잘못된 입력: LSE");
    }
}
