//! 시세/잔고 레코드.
//!
//! 두 타입 모두 파이프라인 한 번의 실행 동안만 유효하며 캐시하지 않습니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::Side;

/// 최우선 호가.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// 종목 코드/티커
    pub symbol: String,
    /// 시장 코드 (해외: 시세 계열 코드, 국내: "KRX")
    pub market_code: String,
    /// 매도 1호가
    pub ask_price: Decimal,
    /// 매수 1호가
    pub bid_price: Decimal,
}

impl Quote {
    /// 주문 방향 쪽 최우선 가격. 매수는 매도 1호가, 매도는 매수 1호가.
    ///
    /// 장 마감 시 KIS는 0 또는 빈 문자열을 돌려주므로 0 이하면 `None`입니다.
    /// 반대쪽 호가는 보지 않습니다.
    pub fn price_for(&self, side: Side) -> Option<Decimal> {
        let price = match side {
            Side::Buy => self.ask_price,
            Side::Sell => self.bid_price,
        };
        (price > Decimal::ZERO).then_some(price)
    }
}

/// 보유 종목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 시장 코드 (해외: 주문 계열 코드, 국내: "KRX")
    pub market_code: String,
    /// 종목 코드/티커
    pub symbol: String,
    /// 종목명
    pub name: String,
    /// 보유 수량
    pub quantity: Decimal,
    /// 매도 가능 수량
    pub sellable_quantity: Decimal,
    /// 매입 평균가
    pub avg_price: Decimal,
    /// 현재가
    pub current_price: Decimal,
    /// 평가 손익
    pub unrealized_pnl: Decimal,
    /// 평가 손익률 (%)
    pub pnl_rate: Decimal,
}

/// 잔고 조회 결과.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// 보유 종목 (수량 0 제외)
    pub positions: Vec<Position>,
    /// 계좌 전체 평가손익
    pub total_pnl: Decimal,
}

impl AccountBalance {
    /// 요약 합계가 없으면 종목별 평가손익을 합산합니다.
    pub fn new(positions: Vec<Position>, reported_total: Option<Decimal>) -> Self {
        let total_pnl =
            reported_total.unwrap_or_else(|| positions.iter().map(|p| p.unrealized_pnl).sum());
        Self {
            positions,
            total_pnl,
        }
    }
}

/// 매수 가능 조회 결과.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyingPower {
    /// 최대 주문 가능 수량
    pub max_quantity: Decimal,
    /// 주문 가능 금액
    pub orderable_amount: Decimal,
}

/// 미체결 주문.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    /// 원주문번호
    pub order_no: String,
    /// 종목 코드/티커
    pub symbol: String,
    /// 시장 코드 (해외: 주문 계열 코드, 국내: "KRX")
    pub market_code: String,
    /// 미체결 수량
    pub quantity: Decimal,
    /// 주문 단가
    pub price: Decimal,
    /// 주문조직번호 (국내 취소 시 필요)
    pub branch: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_price_for_side() {
        let quote = Quote {
            symbol: "AAPL".to_string(),
            market_code: "NAS".to_string(),
            ask_price: dec!(150.05),
            bid_price: dec!(150.00),
        };
        assert_eq!(quote.price_for(Side::Buy), Some(dec!(150.05)));
        assert_eq!(quote.price_for(Side::Sell), Some(dec!(150.00)));

        // 매도호가만 비어 있으면 매도는 가능
        let no_ask = Quote {
            ask_price: Decimal::ZERO,
            ..quote.clone()
        };
        assert_eq!(no_ask.price_for(Side::Buy), None);
        assert_eq!(no_ask.price_for(Side::Sell), Some(dec!(150.00)));

        let no_bid = Quote {
            bid_price: Decimal::ZERO,
            ..quote
        };
        assert_eq!(no_bid.price_for(Side::Sell), None);
        assert_eq!(no_bid.price_for(Side::Buy), Some(dec!(150.05)));
    }

    #[test]
    fn test_account_balance_falls_back_to_row_sum() {
        let position = |symbol: &str, pnl: Decimal| Position {
            market_code: "NASD".to_string(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            quantity: dec!(1),
            sellable_quantity: dec!(1),
            avg_price: Decimal::ZERO,
            current_price: Decimal::ZERO,
            unrealized_pnl: pnl,
            pnl_rate: Decimal::ZERO,
        };
        let rows = vec![position("AAPL", dec!(1000)), position("TSLA", dec!(-250.5))];

        assert_eq!(AccountBalance::new(rows.clone(), None).total_pnl, dec!(749.5));
        assert_eq!(AccountBalance::new(rows, Some(dec!(800))).total_pnl, dec!(800));
    }
}
