//! 애플리케이션 공유 상태.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_exchange::{Brokerage, KisOAuth};
use relay_execution::OrderPipeline;
use rust_decimal::Decimal;

/// 모든 핸들러가 공유하는 상태.
pub struct AppState {
    /// 브로커 게이트웨이
    pub broker: Arc<dyn Brokerage>,
    /// 주문 파이프라인
    pub pipeline: Arc<OrderPipeline>,
    /// KIS 세션 (헬스 체크용, 테스트에서는 없음)
    pub oauth: Option<Arc<KisOAuth>>,
    /// `reduce-all` 기본 축소 비율
    pub reduction_ratio: Decimal,
    /// API 버전
    pub version: String,
    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// 파이프라인으로 상태를 생성합니다. 브로커는 파이프라인과 공유됩니다.
    pub fn new(pipeline: Arc<OrderPipeline>, reduction_ratio: Decimal) -> Self {
        Self {
            broker: Arc::clone(pipeline.broker()),
            pipeline,
            oauth: None,
            reduction_ratio,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    /// KIS 세션 설정.
    pub fn with_oauth(mut self, oauth: Arc<KisOAuth>) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
