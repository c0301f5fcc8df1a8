//! 주문 관련 도메인 타입.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::exchange::Venue;
use crate::error::RelayError;

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(RelayError::InvalidInput(format!(
                "알 수 없는 주문 방향: {}",
                other
            ))),
        }
    }
}

/// KIS 주문구분(ORD_DVSN) 코드.
pub mod order_type {
    /// 지정가
    pub const LIMIT: &str = "00";
    /// 시장가
    pub const MARKET: &str = "01";
    /// 조건부 지정가
    pub const CONDITIONAL_LIMIT: &str = "02";
    /// 최유리 지정가
    pub const BEST_LIMIT: &str = "03";
    /// 최우선 지정가
    pub const PRIORITY_LIMIT: &str = "04";
    /// 장전 시간외
    pub const PRE_MARKET: &str = "05";
    /// 장후 시간외
    pub const AFTER_HOURS: &str = "06";
    /// 시간외 단일가
    pub const SINGLE_PRICE: &str = "07";
    /// 자기주식
    pub const TREASURY: &str = "08";
    /// 자기주식 S-Option
    pub const TREASURY_S_OPTION: &str = "09";
    /// 자기주식 금전신탁
    pub const TREASURY_TRUST: &str = "10";
    /// IOC 지정가
    pub const IOC_LIMIT: &str = "11";
    /// FOK 지정가
    pub const FOK_LIMIT: &str = "12";
    /// IOC 시장가
    pub const IOC_MARKET: &str = "13";
    /// FOK 시장가
    pub const FOK_MARKET: &str = "14";
    /// IOC 최유리
    pub const IOC_BEST: &str = "15";
    /// FOK 최유리
    pub const FOK_BEST: &str = "16";

    /// 정의된 주문구분 코드인지 확인.
    pub fn is_known(code: &str) -> bool {
        matches!(code.parse::<u8>(), Ok(n) if n <= 16) && code.len() == 2
    }
}

/// 브로커에 제출할 주문.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 시장 (국내 또는 해외 거래소)
    pub venue: Venue,
    /// 종목 코드/티커
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 수량
    pub quantity: u64,
    /// 주문 단가
    pub price: Decimal,
    /// 주문구분 코드
    pub order_type: String,
}

impl OrderRequest {
    /// 지정가 주문 생성.
    pub fn limit(venue: Venue, symbol: impl Into<String>, side: Side, quantity: u64, price: Decimal) -> Self {
        Self {
            venue,
            symbol: symbol.into(),
            side,
            quantity,
            price,
            order_type: order_type::LIMIT.to_string(),
        }
    }
}

/// 브로커 주문 접수 결과.
///
/// 접수가 이 시스템의 마지막 단계이며 체결 여부는 추적하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// 응답 코드 ("0" = 성공)
    pub rt_cd: String,
    /// 메시지 코드
    pub msg_cd: String,
    /// 메시지
    pub msg1: String,
    /// 주문번호 (ODNO)
    pub order_no: String,
    /// 주문시각 (ORD_TMD)
    pub order_time: String,
    /// 한국거래소 전송 주문조직번호 (KRX_FWDG_ORD_ORGNO)
    pub branch: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parse_and_display() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(" sell ".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
        assert_eq!(Side::Buy.to_string(), "BUY");
    }

    #[test]
    fn test_order_type_codes() {
        assert!(order_type::is_known(order_type::LIMIT));
        assert!(order_type::is_known(order_type::FOK_BEST));
        assert!(!order_type::is_known("17"));
        assert!(!order_type::is_known("0"));
        assert!(!order_type::is_known("ab"));
    }
}
