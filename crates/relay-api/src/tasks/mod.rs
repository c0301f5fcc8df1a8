//! 백그라운드 태스크.
//!
//! - 일일 포지션 축소: 설정 시각에 보유 해외 종목을 비율만큼 매도

pub mod reduction;

pub use reduction::{next_run_after, start_reduction_scheduler};
