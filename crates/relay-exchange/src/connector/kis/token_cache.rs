//! 접근 토큰 디스크 캐시.
//!
//! 프로세스 재시작 시 토큰 재발급을 피하기 위해 마지막 발급 토큰을
//! JSON 파일 하나에 저장합니다. KIS는 토큰 발급을 1분에 1회로 제한합니다.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::auth::TokenState;
use crate::ExchangeError;

/// 파일에 저장되는 토큰 레코드.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedToken {
    token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_at: DateTime<Utc>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// 토큰 캐시 파일.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    /// 캐시 파일 경로로 생성.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 캐시된 토큰 로드.
    ///
    /// 파일이 없거나 손상되었으면 `None`을 반환합니다.
    pub async fn load(&self) -> Option<TokenState> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No token cache file");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read token cache");
                return None;
            }
        };

        match serde_json::from_str::<CachedToken>(&raw) {
            Ok(cached) => Some(TokenState::new(
                cached.token,
                cached.token_type,
                cached.expires_at,
            )),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt token cache");
                None
            }
        }
    }

    /// 토큰을 캐시 파일에 저장 (기존 내용 덮어쓰기).
    pub async fn save(&self, token: &TokenState) -> Result<(), ExchangeError> {
        let record = CachedToken {
            token: token.access_token.clone(),
            token_type: token.token_type.clone(),
            expires_at: token.expires_at,
        };
        let json = serde_json::to_string_pretty(&record)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ExchangeError::Configuration(format!("토큰 캐시 디렉터리 생성 실패: {}", e))
            })?;
        }

        tokio::fs::write(&self.path, json).await.map_err(|e| {
            ExchangeError::Configuration(format!("토큰 캐시 저장 실패: {}", e))
        })?;

        debug!(path = %self.path.display(), "Token cache written");
        Ok(())
    }
}
