//! 한국투자증권 (KIS) 브로커 연동 모듈.
//!
//! # 구성
//!
//! - [`auth`]: 세션/토큰 관리자 (`KisOAuth`)
//! - [`envelope`]: 요청 봉투와 응답 분류기 (`KisTransport`)
//! - [`client_us`], [`client_kr`]: 해외/국내 주식 클라이언트
//! - [`gateway`]: 시장에 따라 두 클라이언트로 분기하는 `Brokerage` 구현
//!
//! # API 문서
//!
//! 공식 API 문서: <https://apiportal.koreainvestment.com/>
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use relay_exchange::{KisConfig, KisGateway, KisOAuth, KisTransport};
//!
//! let config = KisConfig::from_env()?;
//! let oauth = Arc::new(KisOAuth::new(config)?);
//! oauth.initialize().await?;
//!
//! let transport = Arc::new(KisTransport::new(oauth)?);
//! let gateway = KisGateway::new(transport);
//! ```

pub mod auth;
pub mod cancel;
pub mod client_kr;
pub mod client_us;
pub mod config;
pub mod envelope;
pub mod gateway;
mod serde_helpers;
pub mod token_cache;

pub use auth::{KisOAuth, TokenState};
pub use cancel::CancelSweepReport;
pub use client_kr::KisKrClient;
pub use client_us::KisUsClient;
pub use config::{KisConfig, KisEnvironment};
pub use envelope::{HttpVerb, KisTransport, RequestEnvelope, ResponseEnvelope};
pub use gateway::KisGateway;
pub use token_cache::TokenCache;

/// KIS 거래 ID (tr_id) 상수 모음.
///
/// 거래 ID는 모든 API 호출에서 작업 유형을 식별하기 위해 필요합니다.
/// 모의투자는 매매 계열 tr_id의 첫 글자 `T`를 `V`로 바꿉니다.
pub mod tr_id {
    // ========================================
    // 국내 주식
    // ========================================

    /// 국내 주식 현재가 조회
    pub const KR_PRICE: &str = "FHKST01010100";

    /// 국내 주식 호가 조회
    pub const KR_ORDERBOOK: &str = "FHKST01010200";

    /// 국내 주식 현금 매수 (실전)
    pub const KR_BUY_REAL: &str = "TTTC0802U";
    /// 국내 주식 현금 매수 (모의)
    pub const KR_BUY_PAPER: &str = "VTTC0802U";

    /// 국내 주식 현금 매도 (실전)
    pub const KR_SELL_REAL: &str = "TTTC0801U";
    /// 국내 주식 현금 매도 (모의)
    pub const KR_SELL_PAPER: &str = "VTTC0801U";

    /// 국내 주식 주문 취소 (실전)
    pub const KR_CANCEL_REAL: &str = "TTTC0803U";
    /// 국내 주식 주문 취소 (모의)
    pub const KR_CANCEL_PAPER: &str = "VTTC0803U";

    /// 국내 주식 잔고 조회 (실전)
    pub const KR_BALANCE_REAL: &str = "TTTC8434R";
    /// 국내 주식 잔고 조회 (모의)
    pub const KR_BALANCE_PAPER: &str = "VTTC8434R";

    /// 국내 주식 매수 가능 조회 (실전)
    pub const KR_BUYABLE_REAL: &str = "TTTC8908R";
    /// 국내 주식 매수 가능 조회 (모의)
    pub const KR_BUYABLE_PAPER: &str = "VTTC8908R";

    /// 국내 주식 정정취소 가능 주문 조회 (모의투자 미지원)
    pub const KR_OPEN_ORDERS: &str = "TTTC8036R";

    // ========================================
    // 해외 주식
    // ========================================

    /// 해외 주식 현재가
    pub const OVERSEAS_PRICE: &str = "HHDFS00000300";

    /// 해외 주식 현재가 호가
    pub const OVERSEAS_ORDERBOOK: &str = "HHDFS76200100";

    /// 해외 주식 잔고 (실전)
    pub const OVERSEAS_BALANCE_REAL: &str = "TTTS3012R";
    /// 해외 주식 잔고 (모의)
    pub const OVERSEAS_BALANCE_PAPER: &str = "VTTS3012R";

    /// 해외 주식 매수 가능 금액 (실전)
    pub const OVERSEAS_BUYABLE_REAL: &str = "TTTS3007R";
    /// 해외 주식 매수 가능 금액 (모의)
    pub const OVERSEAS_BUYABLE_PAPER: &str = "VTTS3007R";

    /// 해외 주식 주문 취소 (실전)
    pub const OVERSEAS_CANCEL_REAL: &str = "TTTT1004U";
    /// 해외 주식 주문 취소 (모의)
    pub const OVERSEAS_CANCEL_PAPER: &str = "VTTT1004U";

    /// 해외 주식 미체결 내역
    pub const OVERSEAS_OPEN_ORDERS: &str = "TTTS3018R";

    /// 미국 매수
    pub const US_BUY: &str = "TTTT1002U";
    /// 미국 매도
    pub const US_SELL: &str = "TTTT1006U";
    /// 홍콩 매수
    pub const HK_BUY: &str = "TTTS1002U";
    /// 홍콩 매도
    pub const HK_SELL: &str = "TTTS1001U";
    /// 상해 매수
    pub const SH_BUY: &str = "TTTS0202U";
    /// 상해 매도
    pub const SH_SELL: &str = "TTTS1005U";
    /// 심천 매수
    pub const SZ_BUY: &str = "TTTS0305U";
    /// 심천 매도
    pub const SZ_SELL: &str = "TTTS0304U";
    /// 도쿄 매수
    pub const JP_BUY: &str = "TTTS0308U";
    /// 도쿄 매도
    pub const JP_SELL: &str = "TTTS0307U";
    /// 베트남 매수
    pub const VN_BUY: &str = "TTTS0311U";
    /// 베트남 매도
    pub const VN_SELL: &str = "TTTS0310U";

    /// 모의투자용 tr_id로 변환 (`T` → `V`).
    pub fn paper(real: &str) -> String {
        match real.strip_prefix('T') {
            Some(rest) => format!("V{}", rest),
            None => real.to_string(),
        }
    }
}
