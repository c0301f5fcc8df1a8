//! 한국투자증권 (KIS) API 설정.
//!
//! 단일 계좌 기준입니다. 자격증명과 계좌 정보는 환경 변수에서 읽습니다.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ExchangeError;

/// 기본 요청 타임아웃 (초).
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// 기본 토큰 캐시 파일 경로.
pub const DEFAULT_TOKEN_CACHE: &str = "token_cache.json";

/// KIS API 환경 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KisEnvironment {
    /// 실전투자
    #[default]
    Real,
    /// 모의투자
    Paper,
}

impl KisEnvironment {
    /// 이 환경의 REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            KisEnvironment::Real => "https://openapi.koreainvestment.com:9443",
            KisEnvironment::Paper => "https://openapivts.koreainvestment.com:29443",
        }
    }

    /// 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "real" | "prod" | "live" | "false" => Some(KisEnvironment::Real),
            "paper" | "mock" | "test" | "true" => Some(KisEnvironment::Paper),
            _ => None,
        }
    }
}

/// KIS API 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KisConfig {
    /// 앱키
    pub app_key: String,
    /// 앱시크릿
    pub app_secret: String,
    /// 계좌번호 - 형식: "XXXXXXXX" 또는 "XXXXXXXX-XX"
    pub account_no: String,
    /// 계좌상품코드 - 주식의 경우 일반적으로 "01"
    pub account_product_code: String,
    /// 환경 (실전/모의)
    pub environment: KisEnvironment,
    /// 고객 유형 (P = 개인, B = 법인)
    pub custtype: String,
    /// 기본 URL 재정의 (테스트/프록시용)
    pub base_url: Option<String>,
    /// user-agent 헤더
    pub user_agent: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 토큰 캐시 파일 경로 (None이면 디스크 캐시 사용 안 함)
    pub token_cache_path: Option<PathBuf>,
}

impl KisConfig {
    /// 새로운 KIS 설정 생성.
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        account_no: impl Into<String>,
        environment: KisEnvironment,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            account_no: account_no.into(),
            account_product_code: "01".to_string(),
            environment,
            custtype: "P".to_string(),
            base_url: None,
            user_agent: default_user_agent(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            token_cache_path: None,
        }
    }

    /// 기본 URL 재정의.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// 계좌상품코드 설정.
    pub fn with_product_code(mut self, code: impl Into<String>) -> Self {
        self.account_product_code = code.into();
        self
    }

    /// 고객 유형 설정.
    pub fn with_custtype(mut self, custtype: impl Into<String>) -> Self {
        self.custtype = custtype.into();
        self
    }

    /// 요청 타임아웃 설정.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// 토큰 캐시 파일 경로 설정.
    pub fn with_token_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_cache_path = Some(path.into());
        self
    }

    /// 환경 변수에서 설정 생성.
    ///
    /// # 환경 변수
    /// - 필수: `KIS_APP_KEY`, `KIS_APP_SECRET`, `KIS_ACCOUNT_NUMBER`
    /// - 선택: `KIS_ACCOUNT_CODE` (기본 "01"), `KIS_ENVIRONMENT` ("real" | "paper"),
    ///   `KIS_CUSTTYPE` (기본 "P"), `KIS_BASE_URL`, `KIS_USER_AGENT`,
    ///   `KIS_TOKEN_CACHE` (기본 "token_cache.json"), `KIS_TIMEOUT_SECS` (기본 5)
    pub fn from_env() -> Result<Self, ExchangeError> {
        let required = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ExchangeError::Configuration(format!("{} 환경변수가 없습니다", name)))
        };
        let optional = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let environment = match optional("KIS_ENVIRONMENT") {
            Some(raw) => KisEnvironment::parse(&raw).ok_or_else(|| {
                ExchangeError::Configuration(format!("KIS_ENVIRONMENT 값이 올바르지 않습니다: {}", raw))
            })?,
            None => KisEnvironment::default(),
        };

        let mut config = Self::new(
            required("KIS_APP_KEY")?,
            required("KIS_APP_SECRET")?,
            required("KIS_ACCOUNT_NUMBER")?,
            environment,
        );

        if let Some(code) = optional("KIS_ACCOUNT_CODE") {
            config.account_product_code = code;
        }
        if let Some(custtype) = optional("KIS_CUSTTYPE") {
            config.custtype = custtype;
        }
        config.base_url = optional("KIS_BASE_URL");
        if let Some(agent) = optional("KIS_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(secs) = optional("KIS_TIMEOUT_SECS") {
            config.timeout_secs = secs.parse().map_err(|_| {
                ExchangeError::Configuration(format!("KIS_TIMEOUT_SECS 값이 올바르지 않습니다: {}", secs))
            })?;
        }
        config.token_cache_path = Some(PathBuf::from(
            optional("KIS_TOKEN_CACHE").unwrap_or_else(|| DEFAULT_TOKEN_CACHE.to_string()),
        ));

        Ok(config)
    }

    /// 앱키/앱시크릿이 모두 있는지 검증.
    pub fn validate_credentials(&self) -> Result<(), ExchangeError> {
        if self.app_key.trim().is_empty() {
            return Err(ExchangeError::Configuration("app_key가 비어 있습니다".to_string()));
        }
        if self.app_secret.trim().is_empty() {
            return Err(ExchangeError::Configuration("app_secret이 비어 있습니다".to_string()));
        }
        Ok(())
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None => self.environment.rest_base_url(),
        }
    }

    /// 모의투자 여부.
    pub fn is_paper(&self) -> bool {
        self.environment == KisEnvironment::Paper
    }

    /// 계좌번호 앞 8자리 반환 (CANO).
    pub fn cano(&self) -> String {
        self.account_no.replace('-', "").chars().take(8).collect()
    }

    /// 계좌상품코드 반환 (ACNT_PRDT_CD).
    pub fn acnt_prdt_cd(&self) -> &str {
        &self.account_product_code
    }
}

fn default_user_agent() -> String {
    format!("kis-relay/{}", env!("CARGO_PKG_VERSION"))
}
