//! 주문 파이프라인이 의존하는 브로커 추상화.

use std::collections::HashSet;

use async_trait::async_trait;
use relay_core::{
    AccountBalance, BuyingPower, OpenOrder, OrderAck, OrderRequest, Position, Quote, Venue,
};
use rust_decimal::Decimal;

use crate::connector::kis::CancelSweepReport;
use crate::{ExchangeError, Fetched};

/// 브로커 게이트웨이.
///
/// 조회는 실패를 빈 값으로 흡수하고 원인을 [`Fetched`]에 싣습니다.
/// 주문은 `Result`를 돌려주어 브로커 거부 코드를 그대로 전달합니다.
#[async_trait]
pub trait Brokerage: Send + Sync {
    /// 현재가.
    async fn last_price(&self, venue: &Venue, symbol: &str) -> Fetched<Option<Decimal>>;

    /// 최우선 호가.
    async fn quote(&self, venue: &Venue, symbol: &str) -> Fetched<Option<Quote>>;

    /// 보유 종목 (수량 0 제외).
    async fn positions(&self, venue: &Venue) -> Fetched<Vec<Position>>;

    /// 보유 종목과 계좌 전체 평가손익.
    ///
    /// 기본 구현은 종목별 평가손익을 합산합니다.
    async fn balance(&self, venue: &Venue) -> Fetched<AccountBalance> {
        self.positions(venue)
            .await
            .map(|positions| AccountBalance::new(positions, None))
    }

    /// 주어진 단가 기준 매수 가능 조회.
    async fn buying_power(
        &self,
        venue: &Venue,
        symbol: &str,
        price: Decimal,
    ) -> Fetched<Option<BuyingPower>>;

    /// 주문 제출. 실패해도 재시도하지 않습니다.
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError>;

    /// 미체결 주문 한 건 취소 (잔량 전부).
    async fn cancel_order(&self, venue: &Venue, order: &OpenOrder) -> Result<OrderAck, ExchangeError>;

    /// 미체결 주문 목록.
    async fn open_orders(&self, venue: &Venue) -> Fetched<Vec<OpenOrder>>;

    /// 미체결 주문 일괄 취소. `skip`에 있는 종목은 건너뜁니다 (대소문자 무시).
    async fn cancel_all(&self, venue: &Venue, skip: &HashSet<String>) -> CancelSweepReport;
}
