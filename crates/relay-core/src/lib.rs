//! # Relay Core
//!
//! KIS 시그널 릴레이의 핵심 도메인 모델 및 공통 인프라를 제공합니다.
//!
//! - 거래소 코드 변환 (시세/주문/매수가능 API 계열별)
//! - 주문 방향, 주문 유형 코드, 호가/포지션 타입
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
