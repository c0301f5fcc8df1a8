//! 주문 파이프라인.
//!
//! 단일 주문: 시장 결정 → 호가 → 수량 → 단가 → 제출 → 결과 정규화.
//! 일괄 축소: 보유 종목마다 축소 수량으로 매도하며, 종목별 실패는
//! 결과에 기록하고 다음 종목으로 넘어갑니다.
//!
//! 주문 제출은 어떤 경우에도 재시도하지 않습니다.

use std::collections::HashSet;
use std::sync::Arc;

use relay_core::{
    order_type, validate_ratio, ApiFamily, Exchange, OrderRequest, Position, Side, Venue,
};
use relay_exchange::{Brokerage, ExchangeError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::resolver::{reduction_quantity, QuantityResolver};

/// 파이프라인 에러.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// 알 수 없는 거래소, 잘못된 주문구분 등 입력 오류
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 호가 조회 결과가 비었거나 사용할 수 없음
    #[error("Quote unavailable for {symbol}: {reason}")]
    QuoteUnavailable { symbol: String, reason: String },

    /// 주문 수량을 결정하지 못함 (0)
    #[error("Quantity unresolved for {symbol}: {reason}")]
    QuantityUnresolved { symbol: String, reason: String },

    /// 브로커가 주문을 거부함
    #[error("Order rejected [{code}]: {message}")]
    OrderRejected { code: String, message: String },

    /// 전송 실패 (재제출하지 않음)
    #[error("Transport error: {0}")]
    Transport(String),

    /// 인증/세션 실패
    #[error("Authentication error: {0}")]
    Auth(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ExchangeError> for ExecutionError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::ApiError { msg_cd, message, .. } => ExecutionError::OrderRejected {
                code: msg_cd,
                message,
            },
            ExchangeError::Configuration(msg) => ExecutionError::Configuration(msg),
            e if e.is_auth_error() => ExecutionError::Auth(e.to_string()),
            e => ExecutionError::Transport(e.to_string()),
        }
    }
}

/// 파이프라인 입력 시그널.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRequest {
    /// 시장 구분 (`korea`/`kr`/`domestic`이면 국내)
    pub market: Option<String>,
    /// 거래소 라벨 (해외)
    pub exchange: Option<String>,
    /// 종목 코드/티커
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 명시 수량 (0이면 최대 수량)
    pub quantity: u64,
    /// 주문구분 코드 (없으면 설정 기본값)
    pub order_type: Option<String>,
}

/// 파이프라인 설정.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 일괄 축소 대상 거래소
    pub reduction_exchanges: Vec<Exchange>,
    /// 기본 주문구분
    pub order_type: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reduction_exchanges: vec![Exchange::Nasdaq],
            order_type: order_type::LIMIT.to_string(),
        }
    }
}

/// 단일 주문 실행 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// "success"
    pub status: String,
    /// 주문 시장
    pub venue: Venue,
    /// 종목
    pub symbol: String,
    /// 방향
    pub side: Side,
    /// 응답 코드
    pub rt_cd: String,
    /// 메시지 코드
    pub msg_cd: String,
    /// 메시지
    pub msg1: String,
    /// 주문번호
    pub order_no: String,
    /// 주문시각
    pub order_time: String,
    /// 주문 수량
    pub quantity: u64,
    /// 주문 단가
    pub price: Decimal,
}

/// 종목별 축소 결과 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
    Skipped,
}

/// 종목별 축소 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionOutcome {
    pub symbol: String,
    pub market_code: String,
    pub held_quantity: u64,
    pub quantity: u64,
    pub status: OutcomeStatus,
    pub price: Option<Decimal>,
    pub order_no: Option<String>,
    pub error: Option<String>,
}

/// 일괄 축소 전체 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionStatus {
    /// 모든 잔고 조회가 성공 (개별 주문 실패는 결과에 포함)
    Success,
    /// 잔고 조회 자체가 실패
    Error,
}

/// 일괄 축소 보고서.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionReport {
    pub status: ReductionStatus,
    pub ratio: Decimal,
    pub outcomes: Vec<PositionOutcome>,
    /// 잔고 조회 실패 사유
    pub errors: Vec<String>,
}

impl ReductionReport {
    /// 성공한 주문 수.
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Success)
            .count()
    }

    /// 실패한 주문 수.
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .count()
    }
}

/// 주문 파이프라인.
pub struct OrderPipeline {
    broker: Arc<dyn Brokerage>,
    resolver: QuantityResolver,
    config: PipelineConfig,
}

impl OrderPipeline {
    /// 새로운 파이프라인 생성.
    pub fn new(broker: Arc<dyn Brokerage>, config: PipelineConfig) -> Self {
        Self {
            resolver: QuantityResolver::new(Arc::clone(&broker)),
            broker,
            config,
        }
    }

    /// 브로커 참조.
    pub fn broker(&self) -> &Arc<dyn Brokerage> {
        &self.broker
    }

    /// 수량 계산기 참조.
    pub fn resolver(&self) -> &QuantityResolver {
        &self.resolver
    }

    /// 설정 참조.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 시그널을 주문으로 변환하여 제출합니다.
    ///
    /// # Errors
    /// - 시장/거래소를 결정할 수 없으면 `Validation`
    /// - 호가가 없으면 `QuoteUnavailable`
    /// - 수량이 0이면 `QuantityUnresolved`
    /// - 브로커 거부는 `OrderRejected`, 전송 실패는 `Transport`
    pub async fn resolve_and_execute(
        &self,
        signal: SignalRequest,
    ) -> Result<ExecutionResult, ExecutionError> {
        let venue = Venue::resolve(signal.market.as_deref(), signal.exchange.as_deref())
            .ok_or_else(|| {
                ExecutionError::Validation(format!(
                    "알 수 없는 거래소: {}",
                    signal.exchange.as_deref().unwrap_or("<none>")
                ))
            })?;

        let symbol = signal.symbol.trim();
        if symbol.is_empty() {
            return Err(ExecutionError::Validation("종목 코드가 비어 있습니다".to_string()));
        }

        let order_type = match signal.order_type.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                if !order_type::is_known(code) {
                    return Err(ExecutionError::Validation(format!(
                        "알 수 없는 주문구분: {}",
                        code
                    )));
                }
                code.to_string()
            }
            _ => self.config.order_type.clone(),
        };

        self.execute(venue, symbol, signal.side, signal.quantity, order_type)
            .await
    }

    async fn execute(
        &self,
        venue: Venue,
        symbol: &str,
        side: Side,
        explicit_quantity: u64,
        order_type: String,
    ) -> Result<ExecutionResult, ExecutionError> {
        let fetched = self.broker.quote(&venue, symbol).await;
        let diagnostic = fetched.diagnostic();
        // 항상 스프레드를 건너는 가격
        let price = fetched
            .value
            .and_then(|q| q.price_for(side))
            .ok_or_else(|| ExecutionError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: diagnostic.unwrap_or_else(|| "호가 정보가 없습니다".to_string()),
            })?;

        let quantity = if explicit_quantity > 0 {
            explicit_quantity
        } else {
            let resolved = match side {
                Side::Buy => self.resolver.max_buy_at(&venue, symbol, price).await,
                Side::Sell => self.resolver.max_sell(&venue, symbol).await,
            };
            if resolved.value == 0 {
                return Err(ExecutionError::QuantityUnresolved {
                    symbol: symbol.to_string(),
                    reason: resolved.diagnostic().unwrap_or_else(|| match side {
                        Side::Buy => "매수 가능 수량이 없습니다".to_string(),
                        Side::Sell => "매도 가능 수량이 없습니다".to_string(),
                    }),
                });
            }
            resolved.value
        };

        self.submit(OrderRequest {
            venue,
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            order_type,
        })
        .await
    }

    /// 수량과 단가를 지정한 주문을 호가 조회 없이 제출합니다.
    ///
    /// 지정가(`00`)는 단가가 0보다 커야 합니다. 시장가 계열은 0을 허용합니다.
    ///
    /// # Errors
    /// 빈 종목, 수량 0, 잘못된 단가, 알 수 없는 주문구분은 `Validation`.
    pub async fn place_order(&self, mut request: OrderRequest) -> Result<ExecutionResult, ExecutionError> {
        request.symbol = request.symbol.trim().to_uppercase();
        if request.symbol.is_empty() {
            return Err(ExecutionError::Validation("종목 코드가 비어 있습니다".to_string()));
        }
        if request.quantity == 0 {
            return Err(ExecutionError::Validation("주문 수량은 1 이상이어야 합니다".to_string()));
        }
        if !order_type::is_known(&request.order_type) {
            return Err(ExecutionError::Validation(format!(
                "알 수 없는 주문구분: {}",
                request.order_type
            )));
        }
        let price_required = request.order_type == order_type::LIMIT;
        if request.price.is_sign_negative() || (price_required && request.price.is_zero()) {
            return Err(ExecutionError::Validation(format!(
                "유효하지 않은 주문 단가: {}",
                request.price
            )));
        }

        self.submit(request).await
    }

    async fn submit(&self, request: OrderRequest) -> Result<ExecutionResult, ExecutionError> {
        let venue = request.venue;
        info!(
            symbol = %request.symbol,
            venue = %venue,
            side = %request.side,
            quantity = request.quantity,
            price = %request.price,
            order_type = %request.order_type,
            "Submitting order"
        );

        let ack = self.broker.submit_order(&request).await.map_err(|e| {
            error!(symbol = %request.symbol, venue = %venue, error = %e, "Order submission failed");
            ExecutionError::from(e)
        })?;

        Ok(ExecutionResult {
            status: "success".to_string(),
            venue,
            symbol: request.symbol,
            side: request.side,
            rt_cd: ack.rt_cd,
            msg_cd: ack.msg_cd,
            msg1: ack.msg1,
            order_no: ack.order_no,
            order_time: ack.order_time,
            quantity: request.quantity,
            price: request.price,
        })
    }

    /// 보유 종목을 비율만큼 일괄 매도합니다.
    ///
    /// 종목별 실패는 결과에 기록하고 계속 진행합니다. 잔고 조회가
    /// 실패한 거래소가 있으면 전체 상태는 `Error`이지만, 조회에 성공한
    /// 거래소의 결과는 그대로 포함됩니다.
    ///
    /// # Errors
    /// 비율이 (0, 1] 범위가 아니면 `Validation`.
    pub async fn reduce_all_positions(
        &self,
        ratio: Decimal,
    ) -> Result<ReductionReport, ExecutionError> {
        let ratio = validate_ratio(ratio).map_err(|e| ExecutionError::Validation(e.to_string()))?;

        info!(%ratio, exchanges = ?self.config.reduction_exchanges, "Starting position reduction");

        let mut outcomes = Vec::new();
        let mut errors = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for exchange in &self.config.reduction_exchanges {
            let venue = Venue::Overseas(*exchange);
            let (positions, listing_error) = self.broker.positions(&venue).await.into_parts();

            if let Some(e) = listing_error {
                error!(exchange = %exchange, error = %e, "Position listing failed");
                errors.push(format!("{}: {}", exchange, e));
                continue;
            }

            for position in positions {
                let key = (position.market_code.to_uppercase(), position.symbol.to_uppercase());
                if !seen.insert(key) {
                    continue;
                }
                let outcome = self.reduce_position(*exchange, &position, ratio).await;
                outcomes.push(outcome);
            }
        }

        let status = if errors.is_empty() {
            ReductionStatus::Success
        } else {
            ReductionStatus::Error
        };

        let report = ReductionReport {
            status,
            ratio,
            outcomes,
            errors,
        };

        info!(
            status = ?report.status,
            succeeded = report.succeeded(),
            failed = report.failed(),
            total = report.outcomes.len(),
            "Position reduction finished"
        );

        Ok(report)
    }

    async fn reduce_position(
        &self,
        listed_on: Exchange,
        position: &Position,
        ratio: Decimal,
    ) -> PositionOutcome {
        let held = position.quantity.floor().to_u64().unwrap_or(0);
        let quantity = reduction_quantity(held, ratio);

        let mut outcome = PositionOutcome {
            symbol: position.symbol.clone(),
            market_code: position.market_code.clone(),
            held_quantity: held,
            quantity,
            status: OutcomeStatus::Skipped,
            price: None,
            order_no: None,
            error: None,
        };

        if quantity == 0 {
            return outcome;
        }

        // 미국 잔고는 한 번에 조회되므로 행의 거래소 코드를 우선 사용
        let exchange = Exchange::from_market_code(&position.market_code, ApiFamily::Order)
            .unwrap_or(listed_on);

        match self
            .execute(
                Venue::Overseas(exchange),
                &position.symbol,
                Side::Sell,
                quantity,
                self.config.order_type.clone(),
            )
            .await
        {
            Ok(result) => {
                outcome.status = OutcomeStatus::Success;
                outcome.price = Some(result.price);
                outcome.order_no = Some(result.order_no);
            }
            Err(e) => {
                warn!(symbol = %position.symbol, error = %e, "Position reduction failed");
                outcome.status = OutcomeStatus::Failed;
                outcome.error = Some(e.to_string());
            }
        }

        outcome
    }
}
