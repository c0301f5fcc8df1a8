//! KIS 해외 주식 REST API 클라이언트.
//!
//! # 지원 기능
//!
//! - 현재가, 호가 조회
//! - 잔고 조회
//! - 매수 가능 금액/수량 조회
//! - 매수/매도 주문, 주문 취소
//! - 미체결 조회 및 일괄 취소
//!
//! 거래소 코드는 API 계열마다 다릅니다 (`Exchange::code` 참조).
//! 시세 계열은 `NAS`, 주문/잔고/매수가능 계열은 `NASD` 형식입니다.

use std::collections::HashSet;
use std::sync::Arc;

use relay_core::{
    AccountBalance, ApiFamily, BuyingPower, Exchange, OpenOrder, OrderAck, OrderRequest, Position, Quote, Side,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use super::cancel::{self, CancelSweepReport, CANCEL_INTERVAL};
use super::envelope::{KisTransport, RequestEnvelope};
use super::serde_helpers::{deserialize_decimal, deserialize_rows};
use super::tr_id;
use crate::{ExchangeError, Fetched};

const PRICE_PATH: &str = "/uapi/overseas-price/v1/quotations/price";
const ORDERBOOK_PATH: &str = "/uapi/overseas-price/v1/quotations/inquire-asking-price";
const BALANCE_PATH: &str = "/uapi/overseas-stock/v1/trading/inquire-balance";
const BUYABLE_PATH: &str = "/uapi/overseas-stock/v1/trading/inquire-psamount";
const ORDER_PATH: &str = "/uapi/overseas-stock/v1/trading/order";
const CANCEL_PATH: &str = "/uapi/overseas-stock/v1/trading/order-rvsecncl";
const OPEN_ORDERS_PATH: &str = "/uapi/overseas-stock/v1/trading/inquire-nccs";

/// KIS 해외 주식 REST API 클라이언트.
///
/// `KisTransport`를 `Arc`로 공유하여 국내 클라이언트와 같은 세션을 씁니다.
/// KIS API는 토큰 발급을 1분에 1회로 제한하므로 세션 공유가 필수적입니다.
pub struct KisUsClient {
    transport: Arc<KisTransport>,
}

impl KisUsClient {
    /// 공유 전송 계층으로 클라이언트 생성.
    pub fn new(transport: Arc<KisTransport>) -> Self {
        Self { transport }
    }

    /// 거래소/방향별 주문 tr_id.
    pub fn order_tr_id(&self, exchange: Exchange, side: Side) -> String {
        let real = match (exchange, side) {
            (Exchange::Nasdaq | Exchange::Nyse | Exchange::Amex, Side::Buy) => tr_id::US_BUY,
            (Exchange::Nasdaq | Exchange::Nyse | Exchange::Amex, Side::Sell) => tr_id::US_SELL,
            (Exchange::HongKong, Side::Buy) => tr_id::HK_BUY,
            (Exchange::HongKong, Side::Sell) => tr_id::HK_SELL,
            (Exchange::Shanghai, Side::Buy) => tr_id::SH_BUY,
            (Exchange::Shanghai, Side::Sell) => tr_id::SH_SELL,
            (Exchange::Shenzhen, Side::Buy) => tr_id::SZ_BUY,
            (Exchange::Shenzhen, Side::Sell) => tr_id::SZ_SELL,
            (Exchange::Tokyo, Side::Buy) => tr_id::JP_BUY,
            (Exchange::Tokyo, Side::Sell) => tr_id::JP_SELL,
            (Exchange::Hanoi | Exchange::HoChiMinh, Side::Buy) => tr_id::VN_BUY,
            (Exchange::Hanoi | Exchange::HoChiMinh, Side::Sell) => tr_id::VN_SELL,
        };

        if self.transport.config().is_paper() {
            tr_id::paper(real)
        } else {
            real.to_string()
        }
    }

    fn account_params(&self, envelope: RequestEnvelope) -> RequestEnvelope {
        let config = self.transport.config();
        envelope
            .param("CANO", config.cano())
            .param("ACNT_PRDT_CD", config.acnt_prdt_cd())
    }

    // ========================================
    // 시세 조회
    // ========================================

    /// 현재가 조회.
    pub async fn last_price(&self, exchange: Exchange, symbol: &str) -> Fetched<Option<Decimal>> {
        Fetched::capture(self.fetch_last_price(exchange, symbol).await, "overseas_price")
    }

    async fn fetch_last_price(
        &self,
        exchange: Exchange,
        symbol: &str,
    ) -> Result<Option<Decimal>, ExchangeError> {
        let envelope = RequestEnvelope::get(PRICE_PATH, tr_id::OVERSEAS_PRICE)
            .param("AUTH", "")
            .param("EXCD", exchange.code(ApiFamily::Quote))
            .param("SYMB", symbol);

        let resp: PriceResponse = self.transport.call(&envelope).await?;
        Ok(resp.output.map(|o| o.last).filter(|p| *p > Decimal::ZERO))
    }

    /// 최우선 호가 조회.
    pub async fn quote(&self, exchange: Exchange, symbol: &str) -> Fetched<Option<Quote>> {
        Fetched::capture(self.fetch_quote(exchange, symbol).await, "overseas_hoga")
    }

    async fn fetch_quote(&self, exchange: Exchange, symbol: &str) -> Result<Option<Quote>, ExchangeError> {
        let market_code = exchange.code(ApiFamily::Quote);
        let envelope = RequestEnvelope::get(ORDERBOOK_PATH, tr_id::OVERSEAS_ORDERBOOK)
            .param("AUTH", "")
            .param("EXCD", market_code)
            .param("SYMB", symbol);

        let resp: OrderbookResponse = self.transport.call(&envelope).await?;

        let quote = resp.output2.map(|book| Quote {
            symbol: symbol.to_string(),
            market_code: market_code.to_string(),
            ask_price: book.ask_price,
            bid_price: book.bid_price,
        });

        debug!(symbol, exchange = %exchange, ?quote, "Overseas hoga");
        Ok(quote)
    }

    // ========================================
    // 계좌 조회
    // ========================================

    /// 보유 종목 조회 (수량 0 제외).
    ///
    /// 미국 거래소는 하나의 코드로 조회해도 세 거래소 보유분이 모두 반환됩니다.
    pub async fn positions(&self, exchange: Exchange) -> Fetched<Vec<Position>> {
        self.balance(exchange).await.map(|balance| balance.positions)
    }

    /// 잔고 조회 (보유 종목 + 총평가손익 `tot_evlu_pfls_amt`).
    pub async fn balance(&self, exchange: Exchange) -> Fetched<AccountBalance> {
        Fetched::capture(self.fetch_balance(exchange).await, "overseas_balance")
    }

    async fn fetch_balance(&self, exchange: Exchange) -> Result<AccountBalance, ExchangeError> {
        let tr_id = self
            .transport
            .tr_id(tr_id::OVERSEAS_BALANCE_REAL, tr_id::OVERSEAS_BALANCE_PAPER);
        let envelope = self
            .account_params(RequestEnvelope::get(BALANCE_PATH, tr_id))
            .param("OVRS_EXCG_CD", exchange.code(ApiFamily::Order))
            .param("TR_CRCY_CD", exchange.currency())
            .param("CTX_AREA_FK200", "")
            .param("CTX_AREA_NK200", "");

        let resp: BalanceResponse = self.transport.call(&envelope).await?;

        let positions: Vec<Position> = resp
            .output1
            .into_iter()
            .filter(|row| !row.quantity.is_zero())
            .map(|row| Position {
                market_code: if row.exchange_code.is_empty() {
                    exchange.code(ApiFamily::Order).to_string()
                } else {
                    row.exchange_code
                },
                symbol: row.symbol,
                name: row.name,
                quantity: row.quantity,
                sellable_quantity: row.sellable_quantity,
                avg_price: row.avg_price,
                current_price: row.current_price,
                unrealized_pnl: row.unrealized_pnl,
                pnl_rate: row.pnl_rate,
            })
            .collect();

        let total = resp.output2.first().map(|summary| summary.total_pnl);
        debug!(exchange = %exchange, count = positions.len(), ?total, "Overseas balance");
        Ok(AccountBalance::new(positions, total))
    }

    /// 주어진 단가 기준 매수 가능 금액/수량 조회.
    pub async fn buying_power(
        &self,
        exchange: Exchange,
        symbol: &str,
        price: Decimal,
    ) -> Fetched<Option<BuyingPower>> {
        Fetched::capture(
            self.fetch_buying_power(exchange, symbol, price).await,
            "overseas_psamount",
        )
    }

    async fn fetch_buying_power(
        &self,
        exchange: Exchange,
        symbol: &str,
        price: Decimal,
    ) -> Result<Option<BuyingPower>, ExchangeError> {
        let tr_id = self
            .transport
            .tr_id(tr_id::OVERSEAS_BUYABLE_REAL, tr_id::OVERSEAS_BUYABLE_PAPER);
        let envelope = self
            .account_params(RequestEnvelope::get(BUYABLE_PATH, tr_id))
            .param("OVRS_EXCG_CD", exchange.code(ApiFamily::BuyingPower))
            .param("OVRS_ORD_UNPR", price.to_string())
            .param("ITEM_CD", symbol);

        let resp: BuyableResponse = self.transport.call(&envelope).await?;
        Ok(resp.output.map(|o| BuyingPower {
            max_quantity: o.max_quantity,
            orderable_amount: o.orderable_amount,
        }))
    }

    // ========================================
    // 주문
    // ========================================

    /// 주문 제출.
    ///
    /// # Errors
    /// 브로커 거부는 `ApiError`, 그 외 전송 에러. 재시도하지 않습니다.
    pub async fn submit_order(
        &self,
        exchange: Exchange,
        order: &OrderRequest,
    ) -> Result<OrderAck, ExchangeError> {
        let mut envelope = self
            .account_params(RequestEnvelope::post(
                ORDER_PATH,
                self.order_tr_id(exchange, order.side),
            ))
            .param("OVRS_EXCG_CD", exchange.code(ApiFamily::Order))
            .param("PDNO", order.symbol.as_str())
            .param("ORD_QTY", order.quantity.to_string())
            .param("OVRS_ORD_UNPR", order.price.to_string())
            .param("ORD_SVR_DVSN_CD", "0")
            .param("ORD_DVSN", order.order_type.as_str())
            .signed();
        if order.side == Side::Sell {
            envelope = envelope.param("SLL_TYPE", "00");
        }

        info!(
            symbol = %order.symbol,
            exchange = %exchange,
            side = %order.side,
            quantity = order.quantity,
            price = %order.price,
            "Submitting overseas order"
        );

        let ack = self.transport.execute(&envelope).await?.into_order_ack()?;
        info!(symbol = %order.symbol, order_no = %ack.order_no, "Overseas order accepted");
        Ok(ack)
    }

    /// 주문 취소 (잔량 전부).
    pub async fn cancel_order(&self, order: &OpenOrder) -> Result<OrderAck, ExchangeError> {
        let tr_id = self
            .transport
            .tr_id(tr_id::OVERSEAS_CANCEL_REAL, tr_id::OVERSEAS_CANCEL_PAPER);
        let envelope = self
            .account_params(RequestEnvelope::post(CANCEL_PATH, tr_id))
            .param("OVRS_EXCG_CD", order.market_code.as_str())
            .param("PDNO", order.symbol.as_str())
            .param("ORGN_ODNO", order.order_no.as_str())
            .param("RVSE_CNCL_DVSN_CD", "02")
            .param("ORD_QTY", order.quantity.trunc().to_string())
            .param("OVRS_ORD_UNPR", "0")
            .param("ORD_SVR_DVSN_CD", "0")
            .signed();

        self.transport.execute(&envelope).await?.into_order_ack()
    }

    /// 미체결 주문 조회.
    pub async fn open_orders(&self, exchange: Exchange) -> Fetched<Vec<OpenOrder>> {
        Fetched::capture(self.fetch_open_orders(exchange).await, "overseas_nccs")
    }

    async fn fetch_open_orders(&self, exchange: Exchange) -> Result<Vec<OpenOrder>, ExchangeError> {
        let envelope = self
            .account_params(RequestEnvelope::get(OPEN_ORDERS_PATH, tr_id::OVERSEAS_OPEN_ORDERS))
            .param("OVRS_EXCG_CD", exchange.code(ApiFamily::Order))
            .param("SORT_SQN", "DS")
            .param("CTX_AREA_FK200", "")
            .param("CTX_AREA_NK200", "");

        let resp: OpenOrdersResponse = self.transport.call(&envelope).await?;
        Ok(resp
            .output
            .into_iter()
            .map(|row| OpenOrder {
                market_code: if row.exchange_code.is_empty() {
                    exchange.code(ApiFamily::Order).to_string()
                } else {
                    row.exchange_code
                },
                order_no: row.order_no,
                symbol: row.symbol,
                quantity: row.quantity,
                price: row.price,
                branch: row.branch,
            })
            .collect())
    }

    /// 미체결 주문 일괄 취소.
    pub async fn cancel_all(&self, exchange: Exchange, skip: &HashSet<String>) -> CancelSweepReport {
        let listing = self.open_orders(exchange).await;
        cancel::sweep(listing, skip, CANCEL_INTERVAL, |order| async move {
            self.cancel_order(&order).await.map(|_| ())
        })
        .await
    }
}

// ========================================
// 응답 타입
// ========================================

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    output: Option<PriceOutput>,
}

#[derive(Debug, Deserialize)]
struct PriceOutput {
    #[serde(default, deserialize_with = "deserialize_decimal")]
    last: Decimal,
}

#[derive(Debug, Deserialize)]
struct OrderbookResponse {
    #[serde(default)]
    output2: Option<OrderbookLevel>,
}

#[derive(Debug, Deserialize)]
struct OrderbookLevel {
    #[serde(rename = "pask1", default, deserialize_with = "deserialize_decimal")]
    ask_price: Decimal,
    #[serde(rename = "pbid1", default, deserialize_with = "deserialize_decimal")]
    bid_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(default, deserialize_with = "deserialize_rows")]
    output1: Vec<BalanceRow>,
    #[serde(default, deserialize_with = "deserialize_rows")]
    output2: Vec<BalanceSummary>,
}

#[derive(Debug, Deserialize)]
struct BalanceSummary {
    #[serde(rename = "tot_evlu_pfls_amt", default, deserialize_with = "deserialize_decimal")]
    total_pnl: Decimal,
}

#[derive(Debug, Deserialize)]
struct BalanceRow {
    #[serde(rename = "ovrs_excg_cd", default)]
    exchange_code: String,
    #[serde(rename = "ovrs_pdno", default)]
    symbol: String,
    #[serde(rename = "ovrs_item_name", default)]
    name: String,
    #[serde(rename = "ovrs_cblc_qty", default, deserialize_with = "deserialize_decimal")]
    quantity: Decimal,
    #[serde(rename = "ord_psbl_qty", default, deserialize_with = "deserialize_decimal")]
    sellable_quantity: Decimal,
    #[serde(rename = "pchs_avg_pric", default, deserialize_with = "deserialize_decimal")]
    avg_price: Decimal,
    #[serde(rename = "now_pric2", default, deserialize_with = "deserialize_decimal")]
    current_price: Decimal,
    #[serde(rename = "frcr_evlu_pfls_amt", default, deserialize_with = "deserialize_decimal")]
    unrealized_pnl: Decimal,
    #[serde(rename = "evlu_pfls_rt", default, deserialize_with = "deserialize_decimal")]
    pnl_rate: Decimal,
}

#[derive(Debug, Deserialize)]
struct BuyableResponse {
    #[serde(default)]
    output: Option<BuyableOutput>,
}

#[derive(Debug, Deserialize)]
struct BuyableOutput {
    #[serde(rename = "max_ord_psbl_qty", default, deserialize_with = "deserialize_decimal")]
    max_quantity: Decimal,
    #[serde(rename = "ord_psbl_frcr_amt", default, deserialize_with = "deserialize_decimal")]
    orderable_amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct OpenOrdersResponse {
    #[serde(default, deserialize_with = "deserialize_rows")]
    output: Vec<OpenOrderRow>,
}

#[derive(Debug, Deserialize)]
struct OpenOrderRow {
    #[serde(rename = "odno", default)]
    order_no: String,
    #[serde(rename = "pdno", default)]
    symbol: String,
    #[serde(rename = "ovrs_excg_cd", default)]
    exchange_code: String,
    #[serde(rename = "nccs_qty", default, deserialize_with = "deserialize_decimal")]
    quantity: Decimal,
    #[serde(rename = "ft_ord_unpr3", default, deserialize_with = "deserialize_decimal")]
    price: Decimal,
    #[serde(rename = "ord_gno_brno", default)]
    branch: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::kis::{KisConfig, KisEnvironment, KisOAuth};

    fn client(environment: KisEnvironment) -> KisUsClient {
        let config = KisConfig::new("key", "secret", "12345678-01", environment);
        let oauth = Arc::new(KisOAuth::new(config).unwrap());
        KisUsClient::new(Arc::new(KisTransport::new(oauth).unwrap()))
    }

    #[test]
    fn test_order_tr_id_by_exchange() {
        let real = client(KisEnvironment::Real);
        assert_eq!(real.order_tr_id(Exchange::Nasdaq, Side::Buy), "TTTT1002U");
        assert_eq!(real.order_tr_id(Exchange::Nyse, Side::Sell), "TTTT1006U");
        assert_eq!(real.order_tr_id(Exchange::HongKong, Side::Sell), "TTTS1001U");
        assert_eq!(real.order_tr_id(Exchange::Tokyo, Side::Buy), "TTTS0308U");
        assert_eq!(real.order_tr_id(Exchange::HoChiMinh, Side::Buy), "TTTS0311U");

        let paper = client(KisEnvironment::Paper);
        assert_eq!(paper.order_tr_id(Exchange::Nasdaq, Side::Buy), "VTTT1002U");
    }

    #[test]
    fn test_balance_row_decoding() {
        let body = serde_json::json!({
            "output1": [{
                "ovrs_excg_cd": "NASD",
                "ovrs_pdno": "AAPL",
                "ovrs_item_name": "애플",
                "ovrs_cblc_qty": "100",
                "ord_psbl_qty": "100",
                "pchs_avg_pric": "140.5000",
                "now_pric2": "150.000000",
                "frcr_evlu_pfls_amt": "950.00000",
                "evlu_pfls_rt": "6.76",
            }]
        });
        let resp: BalanceResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.output1.len(), 1);
        assert_eq!(resp.output1[0].sellable_quantity, Decimal::from(100));
        assert!(resp.output2.is_empty());
    }

    #[test]
    fn test_balance_summary_decoding() {
        let body = serde_json::json!({
            "output1": [],
            "output2": {
                "tot_evlu_pfls_amt": "1234.56000",
                "tot_pftrt": "4.21"
            }
        });
        let resp: BalanceResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.output2[0].total_pnl, Decimal::new(123456, 2));
    }
}
