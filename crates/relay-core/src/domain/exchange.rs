//! 거래소 코드 변환.
//!
//! KIS 해외주식 API는 같은 거래소라도 API 계열마다 다른 코드를 요구합니다.
//! 시세(호가/현재가) 계열은 3자리 코드(`NAS`), 주문/매수가능 계열은
//! 4자리 코드(`NASD`)를 사용합니다.
//!
//! | 거래소      | 시세 | 주문 | 매수가능 | 통화 |
//! |-------------|------|------|----------|------|
//! | NASDAQ      | NAS  | NASD | NASD     | USD  |
//! | NYSE        | NYS  | NYSE | NYSE     | USD  |
//! | AMEX        | AMS  | AMEX | AMEX     | USD  |
//! | HONGKONG    | HKS  | SEHK | SEHK     | HKD  |
//! | SHANGHAI    | SHS  | SHAA | SHAA     | CNY  |
//! | SHENZHEN    | SZS  | SZAA | SZAA     | CNY  |
//! | TOKYO       | TSE  | TKSE | TKSE     | JPY  |
//! | HANOI       | HNX  | HASE | HASE     | VND  |
//! | HOCHIMINH   | HSX  | VNSE | VNSE     | VND  |

use std::fmt;

use serde::{Deserialize, Serialize};

/// 해외 거래소.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Nasdaq,
    Nyse,
    Amex,
    #[serde(rename = "HONGKONG")]
    HongKong,
    Shanghai,
    Shenzhen,
    Tokyo,
    Hanoi,
    #[serde(rename = "HOCHIMINH")]
    HoChiMinh,
}

/// 거래소 코드를 요구하는 KIS API 계열.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiFamily {
    /// 호가/현재가 조회
    Quote,
    /// 주문/취소/잔고
    Order,
    /// 매수가능금액 조회
    BuyingPower,
}

impl Exchange {
    /// 지원하는 전체 거래소.
    pub const ALL: [Exchange; 9] = [
        Exchange::Nasdaq,
        Exchange::Nyse,
        Exchange::Amex,
        Exchange::HongKong,
        Exchange::Shanghai,
        Exchange::Shenzhen,
        Exchange::Tokyo,
        Exchange::Hanoi,
        Exchange::HoChiMinh,
    ];

    /// 논리 이름 (대문자).
    pub fn name(&self) -> &'static str {
        match self {
            Exchange::Nasdaq => "NASDAQ",
            Exchange::Nyse => "NYSE",
            Exchange::Amex => "AMEX",
            Exchange::HongKong => "HONGKONG",
            Exchange::Shanghai => "SHANGHAI",
            Exchange::Shenzhen => "SHENZHEN",
            Exchange::Tokyo => "TOKYO",
            Exchange::Hanoi => "HANOI",
            Exchange::HoChiMinh => "HOCHIMINH",
        }
    }

    /// API 계열별 거래소 코드.
    pub fn code(&self, family: ApiFamily) -> &'static str {
        match family {
            ApiFamily::Quote => match self {
                Exchange::Nasdaq => "NAS",
                Exchange::Nyse => "NYS",
                Exchange::Amex => "AMS",
                Exchange::HongKong => "HKS",
                Exchange::Shanghai => "SHS",
                Exchange::Shenzhen => "SZS",
                Exchange::Tokyo => "TSE",
                Exchange::Hanoi => "HNX",
                Exchange::HoChiMinh => "HSX",
            },
            ApiFamily::Order | ApiFamily::BuyingPower => match self {
                Exchange::Nasdaq => "NASD",
                Exchange::Nyse => "NYSE",
                Exchange::Amex => "AMEX",
                Exchange::HongKong => "SEHK",
                Exchange::Shanghai => "SHAA",
                Exchange::Shenzhen => "SZAA",
                Exchange::Tokyo => "TKSE",
                Exchange::Hanoi => "HASE",
                Exchange::HoChiMinh => "VNSE",
            },
        }
    }

    /// 결제 통화 코드.
    pub fn currency(&self) -> &'static str {
        match self {
            Exchange::Nasdaq | Exchange::Nyse | Exchange::Amex => "USD",
            Exchange::HongKong => "HKD",
            Exchange::Shanghai | Exchange::Shenzhen => "CNY",
            Exchange::Tokyo => "JPY",
            Exchange::Hanoi | Exchange::HoChiMinh => "VND",
        }
    }

    /// 외부 라벨을 거래소로 변환 (대소문자 무시).
    ///
    /// 논리 이름(`NASDAQ`, `HONGKONG` ...) 외에 알림 서비스가 보내는
    /// 거래소 라벨(`HKEX`, `SSE`, `SZSE`, `TSE`, `HOSE` ...)과
    /// KIS 주문 코드(`NASD`, `SEHK` ...)도 받습니다.
    /// 알 수 없는 라벨은 `None`입니다.
    pub fn from_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_uppercase();
        let exchange = match upper.as_str() {
            "NASDAQ" | "NASD" | "NAS" => Exchange::Nasdaq,
            "NYSE" | "NYS" => Exchange::Nyse,
            "AMEX" | "AMS" | "NYSEARCA" | "NYSE ARCA" => Exchange::Amex,
            "HONGKONG" | "HKEX" | "SEHK" | "HKS" => Exchange::HongKong,
            "SHANGHAI" | "SSE" | "SHAA" | "SHS" => Exchange::Shanghai,
            "SHENZHEN" | "SZSE" | "SZAA" | "SZS" => Exchange::Shenzhen,
            "TOKYO" | "TSE" | "TKSE" => Exchange::Tokyo,
            "HANOI" | "HNX" | "HASE" => Exchange::Hanoi,
            "HOCHIMINH" | "HOSE" | "HSX" | "VNSE" => Exchange::HoChiMinh,
            _ => return None,
        };
        Some(exchange)
    }

    /// 특정 API 계열의 거래소 코드를 거래소로 역변환.
    ///
    /// 잔고 응답의 `ovrs_excg_cd`처럼 브로커가 돌려준 코드를 해석할 때 사용합니다.
    pub fn from_market_code(code: &str, family: ApiFamily) -> Option<Self> {
        let upper = code.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|exchange| exchange.code(family) == upper)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 라벨을 API 계열별 거래소 코드로 변환합니다.
///
/// 순수 함수이며, 알 수 없는 라벨은 기본값 없이 `None`을 반환합니다.
pub fn translate(label: &str, family: ApiFamily) -> Option<&'static str> {
    Exchange::from_label(label).map(|exchange| exchange.code(family))
}

/// 주문 대상 시장.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "market", content = "exchange", rename_all = "lowercase")]
pub enum Venue {
    /// 국내 (KRX)
    Domestic,
    /// 해외 거래소
    Overseas(Exchange),
}

impl Venue {
    /// 시그널의 `market`/`exchange` 필드로 시장을 결정합니다.
    ///
    /// `market`이 `korea`/`kr`/`domestic`이면 국내, 그 외에는 거래소 라벨을
    /// 해외 거래소로 변환합니다. 해외인데 라벨을 알 수 없으면 `None`입니다.
    pub fn resolve(market: Option<&str>, exchange_label: Option<&str>) -> Option<Self> {
        let is_domestic = market
            .map(|m| matches!(m.trim().to_lowercase().as_str(), "korea" | "kr" | "domestic"))
            .unwrap_or(false);

        if is_domestic {
            return Some(Venue::Domestic);
        }

        exchange_label
            .and_then(Exchange::from_label)
            .map(Venue::Overseas)
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Domestic => f.write_str("KRX"),
            Venue::Overseas(exchange) => write!(f, "{}", exchange),
        }
    }
}
