//! 애플리케이션 설정.
//!
//! 기본값 → 설정 파일(선택) → `RELAY__*` 환경 변수 순으로 덮어씁니다.
//! 브로커 자격증명은 여기서 다루지 않고 `KisConfig::from_env()`가 담당합니다.

use std::path::Path;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 일일 포지션 축소 스케줄
    #[serde(default)]
    pub reduction: ReductionConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_secs: 30,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 일일 포지션 축소 스케줄 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReductionConfig {
    /// 스케줄러 활성화 여부
    pub enabled: bool,
    /// 실행 시각 (시, 0-23)
    pub hour: u32,
    /// 실행 시각 (분, 0-59)
    pub minute: u32,
    /// 축소 비율, (0, 1]
    pub ratio: Decimal,
    /// 실행 시각 기준 타임존 (IANA 이름)
    pub timezone: String,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 4,
            minute: 0,
            ratio: Decimal::new(5, 1),
            timezone: "Asia/Seoul".to_string(),
        }
    }
}

impl ReductionConfig {
    /// 타임존 파싱.
    pub fn tz(&self) -> RelayResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| RelayError::Config(format!("reduction.timezone: {}", e)))
    }
}

/// 축소 비율이 (0, 1] 범위인지 검증합니다.
pub fn validate_ratio(ratio: Decimal) -> RelayResult<Decimal> {
    if ratio > Decimal::ZERO && ratio <= Decimal::ONE {
        Ok(ratio)
    } else {
        Err(RelayError::Config(format!(
            "축소 비율은 (0, 1] 범위여야 합니다: {}",
            ratio
        )))
    }
}

impl AppConfig {
    /// 파일(선택)과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> RelayResult<Self> {
        let builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("reduction.enabled", true)?
            .set_default("reduction.hour", 4)?
            .set_default("reduction.minute", 0)?
            .set_default("reduction.ratio", "0.5")?
            .set_default("reduction.timezone", "Asia/Seoul")?
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> RelayResult<Self> {
        Self::load("config/default.toml")
    }

    /// 설정 값 검증.
    pub fn validate(&self) -> RelayResult<()> {
        validate_ratio(self.reduction.ratio)?;
        if self.reduction.hour > 23 || self.reduction.minute > 59 {
            return Err(RelayError::Config(format!(
                "유효하지 않은 실행 시각: {:02}:{:02}",
                self.reduction.hour, self.reduction.minute
            )));
        }
        self.reduction.tz()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reduction.hour, 4);
        assert_eq!(config.reduction.ratio, dec!(0.5));
        assert_eq!(config.reduction.tz().unwrap(), chrono_tz::Asia::Seoul);
    }

    #[test]
    fn test_validate_ratio_bounds() {
        assert!(validate_ratio(dec!(1)).is_ok());
        assert!(validate_ratio(dec!(0.01)).is_ok());
        assert!(validate_ratio(dec!(0)).is_err());
        assert!(validate_ratio(dec!(1.5)).is_err());
        assert!(validate_ratio(dec!(-0.5)).is_err());
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let mut config = AppConfig::default();
        config.reduction.hour = 24;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reduction.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
    }
}
