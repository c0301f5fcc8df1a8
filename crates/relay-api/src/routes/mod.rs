//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 브로커 세션 상태 (readiness)
//! - `/api/v1/webhook` - 알림 웹훅
//! - `/api/v1/positions` - 잔고/평가손익 조회, 일괄 축소
//! - `/api/v1/market` - 현재가, 호가, 매수가능, 최대 매수/매도 수량
//! - `/api/v1/orders` - 수동 주문, 단건/일괄 취소, 미체결 조회

pub mod health;
pub mod market;
pub mod orders;
pub mod positions;
pub mod webhook;

pub use health::{health_router, ComponentStatus, HealthResponse};
pub use market::{market_router, PriceResponse, QuantityResponse};
pub use orders::{orders_router, CancelAllRequest, CancelOrderRequest, PlaceOrderRequest};
pub use positions::{positions_router, ReduceAllQuery};
pub use webhook::{webhook_router, TradingViewAlert};

use std::sync::Arc;

use axum::Router;
use relay_core::Venue;
use relay_exchange::Fetched;
use serde::Deserialize;

use crate::error::{exchange_error, validation_error, ApiResult};
use crate::state::AppState;

/// 조회 endpoint 공통 시장 파라미터.
///
/// `market=korea`면 국내, 그 외에는 `exchange` 라벨 (없으면 NASDAQ).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenueQuery {
    pub market: Option<String>,
    pub exchange: Option<String>,
}

impl VenueQuery {
    /// 시장 결정. 알 수 없는 거래소는 422.
    pub fn venue(&self) -> ApiResult<Venue> {
        let label = self.exchange.as_deref().unwrap_or("NASDAQ");
        Venue::resolve(self.market.as_deref(), Some(label))
            .ok_or_else(|| validation_error(format!("알 수 없는 거래소: {}", label)))
    }
}

/// 조회 실패를 HTTP 에러로 올립니다.
pub(crate) fn surface<T>(fetched: Fetched<T>) -> ApiResult<T> {
    match fetched.into_parts() {
        (_, Some(e)) => Err(exchange_error(e)),
        (value, None) => Ok(value),
    }
}

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/webhook", webhook_router())
        .nest("/api/v1/positions", positions_router())
        .nest("/api/v1/market", market_router())
        .nest("/api/v1/orders", orders_router())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::Exchange;

    #[test]
    fn test_venue_query_defaults_to_nasdaq() {
        let query = VenueQuery::default();
        assert_eq!(query.venue().unwrap(), Venue::Overseas(Exchange::Nasdaq));
    }

    #[test]
    fn test_venue_query_domestic_and_unknown() {
        let domestic = VenueQuery {
            market: Some("korea".to_string()),
            exchange: None,
        };
        assert_eq!(domestic.venue().unwrap(), Venue::Domestic);

        let unknown = VenueQuery {
            market: None,
            exchange: Some("LSE".to_string()),
        };
        assert!(unknown.venue().is_err());
    }
}
