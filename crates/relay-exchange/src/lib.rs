//! 한국투자증권(KIS) 브로커 게이트웨이.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 세션/토큰 관리자 (발급, 디스크 캐시, 단일 갱신)
//! - 요청 봉투 및 응답 분류기 (헤더, 해시키 서명, 성공/도메인/전송 실패 구분)
//! - 국내/해외 주식 클라이언트 (호가, 잔고, 매수가능, 주문, 취소, 미체결)
//! - 파이프라인이 의존하는 `Brokerage` trait

pub mod connector;
pub mod error;
pub mod fetched;
pub mod traits;

pub use connector::kis::{
    CancelSweepReport, KisConfig, KisEnvironment, KisGateway, KisKrClient, KisOAuth,
    KisTransport, KisUsClient, RequestEnvelope, ResponseEnvelope, TokenState,
};
pub use error::*;
pub use fetched::Fetched;
pub use traits::Brokerage;
