//! 웹훅 수신 및 관리용 REST API 서버.
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: 웹훅/조회/관리 endpoint
//! - [`error`]: 에러 → HTTP 응답 매핑
//! - [`tasks`]: 일일 포지션 축소 스케줄러

pub mod error;
pub mod routes;
pub mod state;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ApiErrorResponse, ApiResult};
pub use routes::*;
pub use state::AppState;
pub use tasks::{next_run_after, start_reduction_scheduler};
