//! KIS 국내 주식 REST API 클라이언트.
//!
//! 해외 클라이언트와 같은 연산을 국내 엔드포인트로 제공합니다.
//! 시장 코드는 항상 `"KRX"`입니다.

use std::collections::HashSet;
use std::sync::Arc;

use relay_core::{
    AccountBalance, BuyingPower, OpenOrder, OrderAck, OrderRequest, Position, Quote, Side,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use super::cancel::{self, CancelSweepReport, CANCEL_INTERVAL};
use super::envelope::{KisTransport, RequestEnvelope};
use super::serde_helpers::{deserialize_decimal, deserialize_rows};
use super::tr_id;
use crate::{ExchangeError, Fetched};

/// 국내 시장 코드.
pub const KRX: &str = "KRX";

/// 시세 조회 시장 분류 코드 (주식).
const MARKET_DIV_STOCK: &str = "J";

const PRICE_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-price";
const ORDERBOOK_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-asking-price-exp-ccn";
const BALANCE_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-balance";
const BUYABLE_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-psbl-order";
const ORDER_PATH: &str = "/uapi/domestic-stock/v1/trading/order-cash";
const CANCEL_PATH: &str = "/uapi/domestic-stock/v1/trading/order-rvsecncl";
const OPEN_ORDERS_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-psbl-rvsecncl";

/// KIS 국내 주식 REST API 클라이언트.
pub struct KisKrClient {
    transport: Arc<KisTransport>,
}

impl KisKrClient {
    /// 공유 전송 계층으로 클라이언트 생성.
    pub fn new(transport: Arc<KisTransport>) -> Self {
        Self { transport }
    }

    fn account_params(&self, envelope: RequestEnvelope) -> RequestEnvelope {
        let config = self.transport.config();
        envelope
            .param("CANO", config.cano())
            .param("ACNT_PRDT_CD", config.acnt_prdt_cd())
    }

    /// 현재가 조회.
    pub async fn last_price(&self, stock_code: &str) -> Fetched<Option<Decimal>> {
        Fetched::capture(self.fetch_last_price(stock_code).await, "domestic_price")
    }

    async fn fetch_last_price(&self, stock_code: &str) -> Result<Option<Decimal>, ExchangeError> {
        let envelope = RequestEnvelope::get(PRICE_PATH, tr_id::KR_PRICE)
            .param("FID_COND_MRKT_DIV_CODE", MARKET_DIV_STOCK)
            .param("FID_INPUT_ISCD", stock_code);

        let resp: PriceResponse = self.transport.call(&envelope).await?;
        Ok(resp.output.map(|o| o.price).filter(|p| *p > Decimal::ZERO))
    }

    /// 최우선 호가 조회.
    pub async fn quote(&self, stock_code: &str) -> Fetched<Option<Quote>> {
        Fetched::capture(self.fetch_quote(stock_code).await, "domestic_hoga")
    }

    async fn fetch_quote(&self, stock_code: &str) -> Result<Option<Quote>, ExchangeError> {
        let envelope = RequestEnvelope::get(ORDERBOOK_PATH, tr_id::KR_ORDERBOOK)
            .param("FID_COND_MRKT_DIV_CODE", MARKET_DIV_STOCK)
            .param("FID_INPUT_ISCD", stock_code);

        let resp: OrderbookResponse = self.transport.call(&envelope).await?;

        let quote = resp.output1.map(|book| Quote {
            symbol: stock_code.to_string(),
            market_code: KRX.to_string(),
            ask_price: book.ask_price,
            bid_price: book.bid_price,
        });

        debug!(stock_code, ?quote, "Domestic hoga");
        Ok(quote)
    }

    /// 보유 종목 조회 (수량 0 제외).
    pub async fn positions(&self) -> Fetched<Vec<Position>> {
        self.balance().await.map(|balance| balance.positions)
    }

    /// 잔고 조회 (보유 종목 + 평가손익합계 `evlu_pfls_smtl_amt`).
    pub async fn balance(&self) -> Fetched<AccountBalance> {
        Fetched::capture(self.fetch_balance().await, "domestic_balance")
    }

    async fn fetch_balance(&self) -> Result<AccountBalance, ExchangeError> {
        let tr_id = self
            .transport
            .tr_id(tr_id::KR_BALANCE_REAL, tr_id::KR_BALANCE_PAPER);
        let envelope = self
            .account_params(RequestEnvelope::get(BALANCE_PATH, tr_id))
            .param("AFHR_FLPR_YN", "N")
            .param("OFL_YN", "")
            .param("INQR_DVSN", "02")
            .param("UNPR_DVSN", "01")
            .param("FUND_STTL_ICLD_YN", "N")
            .param("FNCG_AMT_AUTO_RDPT_YN", "N")
            .param("PRCS_DVSN", "00")
            .param("CTX_AREA_FK100", "")
            .param("CTX_AREA_NK100", "");

        let resp: BalanceResponse = self.transport.call(&envelope).await?;

        let positions: Vec<Position> = resp
            .output1
            .into_iter()
            .filter(|row| !row.quantity.is_zero())
            .map(|row| Position {
                market_code: KRX.to_string(),
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
        debug!(count = positions.len(), ?total, "Domestic balance");
        Ok(AccountBalance::new(positions, total))
    }

    /// 주어진 단가 기준 매수 가능 조회.
    pub async fn buying_power(&self, stock_code: &str, price: Decimal) -> Fetched<Option<BuyingPower>> {
        Fetched::capture(
            self.fetch_buying_power(stock_code, price).await,
            "domestic_buyable",
        )
    }

    async fn fetch_buying_power(
        &self,
        stock_code: &str,
        price: Decimal,
    ) -> Result<Option<BuyingPower>, ExchangeError> {
        let tr_id = self
            .transport
            .tr_id(tr_id::KR_BUYABLE_REAL, tr_id::KR_BUYABLE_PAPER);
        let envelope = self
            .account_params(RequestEnvelope::get(BUYABLE_PATH, tr_id))
            .param("PDNO", stock_code)
            .param("ORD_UNPR", price.trunc().to_string())
            .param("ORD_DVSN", relay_core::order_type::LIMIT)
            .param("CMA_EVLU_AMT_ICLD_YN", "N")
            .param("OVRS_ICLD_YN", "N");

        let resp: BuyableResponse = self.transport.call(&envelope).await?;
        Ok(resp.output.map(|o| BuyingPower {
            max_quantity: o.max_quantity,
            orderable_amount: o.orderable_amount,
        }))
    }

    /// 현금 주문 제출.
    ///
    /// # Errors
    /// 브로커 거부는 `ApiError`, 그 외 전송 에러. 재시도하지 않습니다.
    pub async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let tr_id = match order.side {
            Side::Buy => self.transport.tr_id(tr_id::KR_BUY_REAL, tr_id::KR_BUY_PAPER),
            Side::Sell => self.transport.tr_id(tr_id::KR_SELL_REAL, tr_id::KR_SELL_PAPER),
        };
        let envelope = self
            .account_params(RequestEnvelope::post(ORDER_PATH, tr_id))
            .param("PDNO", order.symbol.as_str())
            .param("ORD_DVSN", order.order_type.as_str())
            .param("ORD_QTY", order.quantity.to_string())
            // 국내 주문 단가는 원 단위 정수
            .param("ORD_UNPR", order.price.trunc().to_string())
            .signed();

        info!(
            stock_code = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            price = %order.price,
            "Submitting domestic order"
        );

        let ack = self.transport.execute(&envelope).await?.into_order_ack()?;
        info!(stock_code = %order.symbol, order_no = %ack.order_no, "Domestic order accepted");
        Ok(ack)
    }

    /// 주문 취소 (잔량 전부).
    pub async fn cancel_order(&self, order: &OpenOrder) -> Result<OrderAck, ExchangeError> {
        let tr_id = self
            .transport
            .tr_id(tr_id::KR_CANCEL_REAL, tr_id::KR_CANCEL_PAPER);
        let envelope = self
            .account_params(RequestEnvelope::post(CANCEL_PATH, tr_id))
            .param("KRX_FWDG_ORD_ORGNO", order.branch.as_str())
            .param("ORGN_ODNO", order.order_no.as_str())
            .param("ORD_DVSN", relay_core::order_type::LIMIT)
            .param("RVSE_CNCL_DVSN_CD", "02")
            .param("ORD_QTY", "0")
            .param("ORD_UNPR", "0")
            .param("QTY_ALL_ORD_YN", "Y")
            .signed();

        self.transport.execute(&envelope).await?.into_order_ack()
    }

    /// 정정/취소 가능 주문 조회.
    pub async fn open_orders(&self) -> Fetched<Vec<OpenOrder>> {
        Fetched::capture(self.fetch_open_orders().await, "domestic_open_orders")
    }

    async fn fetch_open_orders(&self) -> Result<Vec<OpenOrder>, ExchangeError> {
        let envelope = self
            .account_params(RequestEnvelope::get(OPEN_ORDERS_PATH, tr_id::KR_OPEN_ORDERS))
            .param("CTX_AREA_FK100", "")
            .param("CTX_AREA_NK100", "")
            .param("INQR_DVSN_1", "0")
            .param("INQR_DVSN_2", "0");

        let resp: OpenOrdersResponse = self.transport.call(&envelope).await?;
        Ok(resp
            .output
            .into_iter()
            .map(|row| OpenOrder {
                order_no: row.order_no,
                symbol: row.symbol,
                market_code: KRX.to_string(),
                quantity: row.quantity,
                price: row.price,
                branch: row.branch,
            })
            .collect())
    }

    /// 미체결 주문 일괄 취소.
    pub async fn cancel_all(&self, skip: &HashSet<String>) -> CancelSweepReport {
        let listing = self.open_orders().await;
        cancel::sweep(listing, skip, CANCEL_INTERVAL, |order| async move {
            self.cancel_order(&order).await.map(|_| ())
        })
        .await
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    output: Option<PriceOutput>,
}

#[derive(Debug, Deserialize)]
struct PriceOutput {
    #[serde(rename = "stck_prpr", default, deserialize_with = "deserialize_decimal")]
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct OrderbookResponse {
    #[serde(default)]
    output1: Option<OrderbookLevel>,
}

#[derive(Debug, Deserialize)]
struct OrderbookLevel {
    #[serde(rename = "askp1", default, deserialize_with = "deserialize_decimal")]
    ask_price: Decimal,
    #[serde(rename = "bidp1", default, deserialize_with = "deserialize_decimal")]
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
    #[serde(rename = "evlu_pfls_smtl_amt", default, deserialize_with = "deserialize_decimal")]
    total_pnl: Decimal,
}

#[derive(Debug, Deserialize)]
struct BalanceRow {
    #[serde(rename = "pdno", default)]
    symbol: String,
    #[serde(rename = "prdt_name", default)]
    name: String,
    #[serde(rename = "hldg_qty", default, deserialize_with = "deserialize_decimal")]
    quantity: Decimal,
    #[serde(rename = "ord_psbl_qty", default, deserialize_with = "deserialize_decimal")]
    sellable_quantity: Decimal,
    #[serde(rename = "pchs_avg_pric", default, deserialize_with = "deserialize_decimal")]
    avg_price: Decimal,
    #[serde(rename = "prpr", default, deserialize_with = "deserialize_decimal")]
    current_price: Decimal,
    #[serde(rename = "evlu_pfls_amt", default, deserialize_with = "deserialize_decimal")]
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
    /// 미수 없는 매수 가능 수량
    #[serde(rename = "nrcvb_buy_qty", default, deserialize_with = "deserialize_decimal")]
    max_quantity: Decimal,
    #[serde(rename = "ord_psbl_cash", default, deserialize_with = "deserialize_decimal")]
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
    #[serde(rename = "psbl_qty", default, deserialize_with = "deserialize_decimal")]
    quantity: Decimal,
    #[serde(rename = "ord_unpr", default, deserialize_with = "deserialize_decimal")]
    price: Decimal,
    #[serde(rename = "ord_gno_brno", default)]
    branch: String,
}
