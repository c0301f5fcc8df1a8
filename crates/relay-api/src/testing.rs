//! 라우트 테스트용 메모리 브로커와 상태.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use relay_core::{BuyingPower, OpenOrder, OrderAck, OrderRequest, Position, Quote, Venue};
use relay_exchange::{Brokerage, CancelSweepReport, ExchangeError, Fetched};
use relay_execution::{OrderPipeline, PipelineConfig};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

use crate::state::AppState;

#[derive(Default)]
pub struct FakeBrokerage {
    pub quotes: HashMap<String, Quote>,
    pub failing_quotes: HashSet<String>,
    pub positions: Vec<Position>,
    pub positions_error: Option<fn() -> ExchangeError>,
    pub open_orders: Vec<OpenOrder>,
    pub max_buy: Decimal,
    pub reject_with: Option<(String, String)>,
    pub submitted: Arc<Mutex<Vec<OrderRequest>>>,
    pub cancelled: Arc<Mutex<Vec<String>>>,
}

impl FakeBrokerage {
    pub fn with_quote(mut self, symbol: &str, ask: Decimal, bid: Decimal) -> Self {
        self.quotes.insert(
            symbol.to_string(),
            Quote {
                symbol: symbol.to_string(),
                market_code: "NAS".to_string(),
                ask_price: ask,
                bid_price: bid,
            },
        );
        self
    }

    pub fn with_position(mut self, market_code: &str, symbol: &str, held: Decimal) -> Self {
        self.positions.push(Position {
            market_code: market_code.to_string(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            quantity: held,
            sellable_quantity: held,
            avg_price: Decimal::ZERO,
            current_price: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            pnl_rate: Decimal::ZERO,
        });
        self
    }
}

#[async_trait]
impl Brokerage for FakeBrokerage {
    async fn last_price(&self, _venue: &Venue, symbol: &str) -> Fetched<Option<Decimal>> {
        Fetched::ok(self.quotes.get(symbol).map(|q| q.bid_price))
    }

    async fn quote(&self, _venue: &Venue, symbol: &str) -> Fetched<Option<Quote>> {
        if self.failing_quotes.contains(symbol) {
            return Fetched::failed(None, ExchangeError::Timeout("quote".to_string()));
        }
        Fetched::ok(self.quotes.get(symbol).cloned())
    }

    async fn positions(&self, _venue: &Venue) -> Fetched<Vec<Position>> {
        match self.positions_error {
            Some(make) => Fetched::failed(Vec::new(), make()),
            None => Fetched::ok(self.positions.clone()),
        }
    }

    async fn buying_power(
        &self,
        _venue: &Venue,
        _symbol: &str,
        price: Decimal,
    ) -> Fetched<Option<BuyingPower>> {
        Fetched::ok(Some(BuyingPower {
            max_quantity: self.max_buy,
            orderable_amount: self.max_buy * price,
        }))
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        if let Some((code, message)) = &self.reject_with {
            return Err(ExchangeError::ApiError {
                rt_cd: "1".to_string(),
                msg_cd: code.clone(),
                message: message.clone(),
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(order.clone());
        Ok(OrderAck {
            rt_cd: "0".to_string(),
            msg_cd: "APBK0013".to_string(),
            msg1: "주문 전송 완료 되었습니다.".to_string(),
            order_no: format!("{:010}", submitted.len()),
            order_time: "223045".to_string(),
            branch: String::new(),
        })
    }

    async fn cancel_order(&self, _venue: &Venue, order: &OpenOrder) -> Result<OrderAck, ExchangeError> {
        if let Some((code, message)) = &self.reject_with {
            return Err(ExchangeError::ApiError {
                rt_cd: "1".to_string(),
                msg_cd: code.clone(),
                message: message.clone(),
            });
        }
        self.cancelled.lock().unwrap().push(order.order_no.clone());
        Ok(OrderAck {
            rt_cd: "0".to_string(),
            msg_cd: "APBK0013".to_string(),
            msg1: "주문 취소 완료 되었습니다.".to_string(),
            order_no: order.order_no.clone(),
            order_time: "223110".to_string(),
            branch: order.branch.clone(),
        })
    }

    async fn open_orders(&self, _venue: &Venue) -> Fetched<Vec<OpenOrder>> {
        Fetched::ok(self.open_orders.clone())
    }

    async fn cancel_all(&self, _venue: &Venue, skip: &HashSet<String>) -> CancelSweepReport {
        let mut report = CancelSweepReport::default();
        for order in &self.open_orders {
            if skip.iter().any(|s| s.eq_ignore_ascii_case(&order.symbol)) {
                report.skipped.push(order.order_no.clone());
            } else {
                report.cancelled.push(order.order_no.clone());
            }
        }
        report
    }
}

pub fn create_test_state(broker: FakeBrokerage) -> Arc<AppState> {
    let pipeline = Arc::new(OrderPipeline::new(Arc::new(broker), PipelineConfig::default()));
    Arc::new(AppState::new(pipeline, Decimal::new(5, 1)))
}

/// 전체 라우터에 요청 하나를 보내고 상태 코드와 JSON 본문을 돌려줍니다.
pub async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let app: Router = crate::routes::create_api_router().with_state(state);
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
