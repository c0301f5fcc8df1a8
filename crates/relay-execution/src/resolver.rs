//! 주문 수량 결정.
//!
//! 시그널에 수량이 없을 때 ("전량 매도", "가능한 만큼 매수") 현재 호가와
//! 계좌 상태로 정확한 수량을 계산합니다. 조회 결과는 캐시하지 않습니다.

use std::sync::Arc;

use relay_core::{ApiFamily, Exchange, Venue};
use relay_exchange::{Brokerage, Fetched};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

/// 축소 수량 계산: `ceil(held × ratio)`.
///
/// 비율은 (0, 1] 범위로 설정 단계에서 검증됩니다. 범위를 벗어나면
/// 0 또는 보유 수량으로 잘립니다.
pub fn reduction_quantity(held: u64, ratio: Decimal) -> u64 {
    if held == 0 || ratio <= Decimal::ZERO {
        return 0;
    }
    let ratio = ratio.min(Decimal::ONE);
    (Decimal::from(held) * ratio)
        .ceil()
        .to_u64()
        .map_or(held, |qty| qty.min(held))
}

/// 소수 수량을 정수 주로 내림.
fn whole_shares(quantity: Decimal) -> u64 {
    if quantity <= Decimal::ZERO {
        return 0;
    }
    quantity.floor().to_u64().unwrap_or(0)
}

/// 잔고 행의 시장 코드가 주문 대상 시장과 같은지 확인.
fn venue_matches(venue: &Venue, market_code: &str) -> bool {
    match venue {
        Venue::Domestic => true,
        Venue::Overseas(exchange) => {
            Exchange::from_market_code(market_code, ApiFamily::Order) == Some(*exchange)
        }
    }
}

/// 브로커 조회로 주문 수량을 계산합니다.
pub struct QuantityResolver {
    broker: Arc<dyn Brokerage>,
}

impl QuantityResolver {
    /// 새로운 수량 계산기 생성.
    pub fn new(broker: Arc<dyn Brokerage>) -> Self {
        Self { broker }
    }

    /// 최대 매수 수량 (현재 매도 1호가 기준).
    ///
    /// 호가나 매수가능 조회가 비면 0입니다.
    pub async fn max_buy(&self, venue: &Venue, symbol: &str) -> Fetched<u64> {
        let (quote, error) = self.broker.quote(venue, symbol).await.into_parts();
        match quote.filter(|q| q.ask_price > Decimal::ZERO) {
            Some(quote) => self.max_buy_at(venue, symbol, quote.ask_price).await,
            None => Fetched { value: 0, error },
        }
    }

    /// 주어진 단가 기준 최대 매수 수량.
    pub async fn max_buy_at(&self, venue: &Venue, symbol: &str, price: Decimal) -> Fetched<u64> {
        let fetched = self
            .broker
            .buying_power(venue, symbol, price)
            .await
            .map(|power| power.map_or(0, |p| whole_shares(p.max_quantity)));

        debug!(symbol, venue = %venue, %price, quantity = fetched.value, "Max buy quantity");
        fetched
    }

    /// 최대 매도 수량 (해당 시장/종목의 매도 가능 수량).
    ///
    /// 종목 비교는 대소문자를 무시하며, 보유하지 않으면 0입니다.
    pub async fn max_sell(&self, venue: &Venue, symbol: &str) -> Fetched<u64> {
        let fetched = self.broker.positions(venue).await.map(|positions| {
            positions
                .iter()
                .find(|p| p.symbol.eq_ignore_ascii_case(symbol) && venue_matches(venue, &p.market_code))
                .map_or(0, |p| whole_shares(p.sellable_quantity))
        });

        debug!(symbol, venue = %venue, quantity = fetched.value, "Max sell quantity");
        fetched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reduction_quantity_examples() {
        assert_eq!(reduction_quantity(100, dec!(0.5)), 50);
        assert_eq!(reduction_quantity(3, dec!(0.5)), 2);
        assert_eq!(reduction_quantity(1, dec!(0.5)), 1);
        assert_eq!(reduction_quantity(0, dec!(0.5)), 0);
        assert_eq!(reduction_quantity(7, dec!(1)), 7);
        assert_eq!(reduction_quantity(10, dec!(0)), 0);
    }

    #[test]
    fn test_whole_shares() {
        assert_eq!(whole_shares(dec!(10.9)), 10);
        assert_eq!(whole_shares(dec!(-3)), 0);
        assert_eq!(whole_shares(Decimal::ZERO), 0);
    }

    #[test]
    fn test_venue_matches() {
        let nasdaq = Venue::Overseas(Exchange::Nasdaq);
        assert!(venue_matches(&nasdaq, "NASD"));
        assert!(!venue_matches(&nasdaq, "NYSE"));
        assert!(venue_matches(&Venue::Domestic, "KRX"));
    }

    fn arb_ratio() -> impl Strategy<Value = Decimal> {
        (1u32..=100).prop_map(|pct| Decimal::new(pct as i64, 2))
    }

    proptest! {
        /// 축소 수량은 정확히 올림 값이며 보유 수량을 넘지 않음
        #[test]
        fn reduction_is_ceiling_and_bounded(held in 0u64..1_000_000, ratio in arb_ratio()) {
            let qty = reduction_quantity(held, ratio);
            let exact = Decimal::from(held) * ratio;

            prop_assert!(qty <= held);
            prop_assert!(Decimal::from(qty) >= exact);
            prop_assert!(Decimal::from(qty) - exact < Decimal::ONE);
            if held > 0 {
                prop_assert!(qty >= 1);
            }
        }
    }
}
