//! KIS OAuth 세션/토큰 관리자.
//!
//! 처리 기능:
//! - 접근 토큰 발급 (POST /oauth2/tokenP)
//! - 디스크 캐시 재사용 및 저장
//! - 만료 1시간 전 갱신 (동시 갱신은 한 번만 수행)
//! - 해시 키 생성 (POST /uapi/hashkey)
//! - 공통 요청 헤더 생성

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::config::KisConfig;
use super::token_cache::TokenCache;
use crate::ExchangeError;

/// 토큰 갱신 임계값 (남은 시간이 이 값보다 적으면 갱신).
const TOKEN_REFRESH_THRESHOLD_HOURS: i64 = 1;

/// 만료 정보가 없는 응답의 기본 유효 기간.
const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 24;

/// KIS OAuth 토큰 응답.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<i64>,
    /// KIS 형식: "YYYY-MM-DD HH:MM:SS" (KST)
    #[serde(default)]
    access_token_token_expired: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// KIS 해시 키 응답.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct HashkeyResponse {
    hash: String,
}

/// KIS OAuth 오류 응답 (토큰 발급 실패 시).
#[derive(Debug, Clone, Deserialize)]
struct KisOAuthErrorResponse {
    /// 에러 코드 (예: "EGW00103")
    error_code: String,
    /// 에러 설명 (예: "유효하지 않은 AppKey입니다.")
    error_description: String,
}

/// 만료 추적이 포함된 토큰 상태.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenState {
    /// 접근 토큰
    pub access_token: String,
    /// 토큰 타입
    pub token_type: String,
    /// 발급 시각 (캐시에서 복원한 경우 복원 시각)
    pub issued_at: DateTime<Utc>,
    /// 만료 시각
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    /// 새 토큰 상태 생성.
    pub fn new(access_token: String, token_type: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            token_type,
            issued_at: Utc::now(),
            expires_at,
        }
    }

    /// 토큰이 만료되었거나 곧 만료되는지 확인.
    pub fn is_expired_or_expiring(&self) -> bool {
        let threshold = Utc::now() + Duration::hours(TOKEN_REFRESH_THRESHOLD_HOURS);
        self.expires_at <= threshold
    }

    /// 토큰이 유효한지 확인.
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }

    /// 인증 헤더 값 반환.
    pub fn auth_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

#[derive(Debug, Clone)]
enum SessionState {
    Unauthenticated,
    Authenticated(TokenState),
}

/// KIS OAuth 세션 관리자.
///
/// 프로세스 전체에서 `Arc`로 공유합니다. 유효한 토큰을 읽는 호출자는
/// 읽기 잠금만 사용하며, 갱신은 `refresh_gate`로 한 번에 하나만 수행됩니다.
pub struct KisOAuth {
    config: KisConfig,
    client: Client,
    state: RwLock<SessionState>,
    refresh_gate: Mutex<()>,
    cache: Option<TokenCache>,
}

impl KisOAuth {
    /// 새로운 세션 관리자 생성 (Unauthenticated 상태).
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: KisConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP client 생성 실패: {}", e)))?;

        let cache = config.token_cache_path.clone().map(TokenCache::new);

        Ok(Self {
            config,
            client,
            state: RwLock::new(SessionState::Unauthenticated),
            refresh_gate: Mutex::new(()),
            cache,
        })
    }

    /// 세션 초기화.
    ///
    /// 디스크 캐시의 토큰이 1시간 이상 유효하면 재사용하고,
    /// 아니면 새 토큰을 발급합니다.
    ///
    /// # Errors
    /// - 앱키/앱시크릿이 비어 있으면 `Configuration`
    /// - 발급 실패 시 `Unauthorized`
    pub async fn initialize(&self) -> Result<TokenState, ExchangeError> {
        self.config.validate_credentials()?;

        let _gate = self.refresh_gate.lock().await;

        if let Some(cache) = &self.cache {
            if let Some(token) = cache.load().await {
                if !token.is_expired_or_expiring() {
                    info!(expires_at = %token.expires_at, "Reusing cached KIS token");
                    *self.state.write().await = SessionState::Authenticated(token.clone());
                    return Ok(token);
                }
                info!(
                    expires_at = %token.expires_at,
                    "Cached KIS token expires within refresh margin, issuing new token"
                );
            }
        }

        self.issue_token().await
    }

    /// 외부에서 로드한 토큰으로 세션 설정.
    ///
    /// 이미 만료된 토큰은 무시합니다.
    pub async fn set_cached_token(&self, token: TokenState) {
        if token.is_valid() {
            info!(expires_at = %token.expires_at, "Setting cached KIS token");
            *self.state.write().await = SessionState::Authenticated(token);
        } else {
            debug!("Ignoring expired cached token");
        }
    }

    /// 유효한 접근 토큰 반환, 필요시 갱신.
    ///
    /// # Errors
    /// - 초기화 전이면 `NotInitialized`
    /// - 갱신 실패 시 `Unauthorized`
    pub async fn get_token(&self) -> Result<TokenState, ExchangeError> {
        if let Some(token) = self.fresh_token().await? {
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;

        // 대기하는 동안 다른 호출자가 갱신했을 수 있음
        if let Some(token) = self.fresh_token().await? {
            return Ok(token);
        }

        warn!("KIS token expired or expiring soon, refreshing...");
        self.issue_token().await
    }

    async fn fresh_token(&self) -> Result<Option<TokenState>, ExchangeError> {
        match &*self.state.read().await {
            SessionState::Unauthenticated => Err(ExchangeError::NotInitialized),
            SessionState::Authenticated(token) if !token.is_expired_or_expiring() => {
                Ok(Some(token.clone()))
            }
            SessionState::Authenticated(_) => Ok(None),
        }
    }

    /// 새 토큰 발급. 호출자는 `refresh_gate`를 잡고 있어야 합니다.
    async fn issue_token(&self) -> Result<TokenState, ExchangeError> {
        info!(
            "Requesting new KIS access token... (AppKey: {}...)",
            self.config.app_key.chars().take(8).collect::<String>()
        );

        let url = format!("{}/oauth2/tokenP", self.config.rest_base_url());

        #[derive(Serialize)]
        struct TokenRequest<'a> {
            grant_type: &'a str,
            appkey: &'a str,
            appsecret: &'a str,
        }

        let request_body = TokenRequest {
            grant_type: "client_credentials",
            appkey: &self.config.app_key,
            appsecret: &self.config.app_secret,
        };

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json; charset=utf-8")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ExchangeError::Unauthorized(format!("토큰 발급 요청 실패: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::Unauthorized(format!("토큰 응답 수신 실패: {}", e)))?;

        if !status.is_success() {
            error!(status = %status, body = %body, "Token request failed");
            return Err(ExchangeError::Unauthorized(self.describe_oauth_error(&body)));
        }

        let token_resp: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ExchangeError::Unauthorized(format!("토큰 응답 파싱 실패: {}", e))
        })?;

        let expires_at = token_resp
            .access_token_token_expired
            .as_deref()
            .and_then(parse_kis_datetime)
            .or_else(|| {
                token_resp
                    .expires_in
                    .map(|secs| Utc::now() + Duration::seconds(secs))
            })
            .unwrap_or_else(|| Utc::now() + Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS));

        let token_state = TokenState::new(token_resp.access_token, token_resp.token_type, expires_at);

        *self.state.write().await = SessionState::Authenticated(token_state.clone());

        info!(expires_at = %token_state.expires_at, "KIS access token obtained");

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(&token_state).await {
                warn!(error = %e, "Failed to persist KIS token cache");
            }
        }

        Ok(token_state)
    }

    fn describe_oauth_error(&self, body: &str) -> String {
        match serde_json::from_str::<KisOAuthErrorResponse>(body) {
            Ok(oauth_error) => match oauth_error.error_code.as_str() {
                "EGW00103" => format!(
                    "유효하지 않은 AppKey입니다. 환경변수(KIS_APP_KEY, KIS_APP_SECRET)를 확인하세요. AppKey: {}...",
                    self.config.app_key.chars().take(8).collect::<String>()
                ),
                "EGW00102" => {
                    "AppKey가 만료되었습니다. 한국투자증권에서 새 AppKey를 발급받으세요.".to_string()
                }
                "EGW00101" => "AppSecret이 일치하지 않습니다.".to_string(),
                "EGW00133" => "토큰 발급은 1분에 1회만 가능합니다.".to_string(),
                _ => format!("{} ({})", oauth_error.error_description, oauth_error.error_code),
            },
            Err(_) => format!("Token request failed: {}", body),
        }
    }

    /// POST 요청 본문에 대한 해시 키 생성.
    ///
    /// `body`는 본 요청에 그대로 실릴 문자열이어야 합니다.
    ///
    /// # Errors
    /// 어떤 실패든 `HashkeyFailed`로 반환합니다.
    pub async fn hashkey(&self, token: &TokenState, body: &str) -> Result<String, ExchangeError> {
        let url = format!("{}/uapi/hashkey", self.config.rest_base_url());

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json; charset=utf-8")
            .header("authorization", token.auth_header())
            .header("appkey", &self.config.app_key)
            .header("appsecret", &self.config.app_secret)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| ExchangeError::HashkeyFailed(e.to_string()))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| ExchangeError::HashkeyFailed(e.to_string()))?;

        if !status.is_success() {
            error!(status = %status, body = %response_body, "Hashkey generation failed");
            return Err(ExchangeError::HashkeyFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                response_body
            )));
        }

        let hashkey_resp: HashkeyResponse = serde_json::from_str(&response_body)
            .map_err(|e| ExchangeError::HashkeyFailed(format!("응답 파싱 실패: {}", e)))?;

        debug!("Generated hashkey");
        Ok(hashkey_resp.hash)
    }

    /// 인증된 요청을 위한 공통 헤더 생성.
    ///
    /// # Errors
    /// 헤더 값에 허용되지 않는 문자가 있으면 `ExchangeError::ParseError`를 반환합니다.
    pub fn build_headers(
        &self,
        token: &TokenState,
        tr_id: &str,
        hashkey: Option<&str>,
    ) -> Result<HeaderMap, ExchangeError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "content-type",
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert("accept", HeaderValue::from_static("text/plain"));
        headers.insert("charset", HeaderValue::from_static("UTF-8"));

        let authorization = token.auth_header();
        let dynamic = [
            ("user-agent", self.config.user_agent.as_str()),
            ("authorization", authorization.as_str()),
            ("appkey", self.config.app_key.as_str()),
            ("appsecret", self.config.app_secret.as_str()),
            ("tr_id", tr_id),
            ("custtype", self.config.custtype.as_str()),
        ];
        for (name, value) in dynamic {
            insert_header(&mut headers, name, value)?;
        }

        if let Some(hash) = hashkey {
            insert_header(&mut headers, "hashkey", hash)?;
        }

        Ok(headers)
    }

    /// 현재 토큰 반환 (갱신 없이).
    pub async fn current_token(&self) -> Option<TokenState> {
        match &*self.state.read().await {
            SessionState::Authenticated(token) => Some(token.clone()),
            SessionState::Unauthenticated => None,
        }
    }

    /// 세션이 초기화되었는지 확인.
    pub async fn is_authenticated(&self) -> bool {
        matches!(&*self.state.read().await, SessionState::Authenticated(_))
    }

    /// 현재 토큰 만료 시각 반환.
    pub async fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.current_token().await.map(|t| t.expires_at)
    }

    /// 설정 반환.
    pub fn config(&self) -> &KisConfig {
        &self.config
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), ExchangeError> {
    let value = HeaderValue::from_str(value).map_err(|_| {
        ExchangeError::ParseError(format!("{} 헤더에 유효하지 않은 문자 포함", name))
    })?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

/// KIS 날짜시간 형식 파싱 ("YYYY-MM-DD HH:MM:SS", KST).
pub(crate) fn parse_kis_datetime(s: &str) -> Option<DateTime<Utc>> {
    use chrono::{NaiveDateTime, TimeZone};
    use chrono_tz::Asia::Seoul;

    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
    let kst = Seoul.from_local_datetime(&naive).single()?;
    Some(kst.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::kis::config::KisEnvironment;
    use chrono::Timelike;

    fn token_expiring_in(duration: Duration) -> TokenState {
        TokenState::new("test".to_string(), "Bearer".to_string(), Utc::now() + duration)
    }

    #[test]
    fn test_token_state_expiry() {
        let token = token_expiring_in(Duration::hours(24));
        assert!(token.is_valid());
        assert!(!token.is_expired_or_expiring());
    }

    #[test]
    fn test_token_state_expiring() {
        let token = token_expiring_in(Duration::minutes(30));
        assert!(token.is_valid());
        assert!(token.is_expired_or_expiring());
    }

    #[test]
    fn test_token_auth_header() {
        let token = TokenState::new(
            "abc123".to_string(),
            "Bearer".to_string(),
            Utc::now() + Duration::hours(24),
        );
        assert_eq!(token.auth_header(), "Bearer abc123");
    }

    #[test]
    fn test_parse_kis_datetime() {
        let dt = parse_kis_datetime("2026-01-28 15:30:00").unwrap();
        // KST 15:30 = UTC 06:30
        assert_eq!(dt.hour(), 6);
        assert_eq!(dt.minute(), 30);

        assert!(parse_kis_datetime("2026/01/28").is_none());
    }

    #[test]
    fn test_build_headers() {
        let config = KisConfig::new("key", "secret", "12345678", KisEnvironment::Real);
        let oauth = KisOAuth::new(config).unwrap();
        let token = token_expiring_in(Duration::hours(12));

        let headers = oauth.build_headers(&token, "HHDFS76200100", Some("HASH")).unwrap();
        assert_eq!(headers["authorization"], "Bearer test");
        assert_eq!(headers["tr_id"], "HHDFS76200100");
        assert_eq!(headers["custtype"], "P");
        assert_eq!(headers["accept"], "text/plain");
        assert_eq!(headers["charset"], "UTF-8");
        assert_eq!(headers["hashkey"], "HASH");

        let headers = oauth.build_headers(&token, "HHDFS76200100", None).unwrap();
        assert!(headers.get("hashkey").is_none());
    }

    #[tokio::test]
    async fn test_get_token_before_initialize() {
        let config = KisConfig::new("key", "secret", "12345678", KisEnvironment::Real);
        let oauth = KisOAuth::new(config).unwrap();

        assert!(matches!(
            oauth.get_token().await,
            Err(ExchangeError::NotInitialized)
        ));
        assert!(!oauth.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_initialize_rejects_empty_credentials() {
        let config = KisConfig::new("", "", "12345678", KisEnvironment::Real);
        let oauth = KisOAuth::new(config).unwrap();

        assert!(matches!(
            oauth.initialize().await,
            Err(ExchangeError::Configuration(_))
        ));
    }
}
