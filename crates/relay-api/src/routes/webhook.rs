//! 알림 서비스 웹훅 endpoint.
//!
//! 차트 알림(`action`, `symbol`, `quantity` ...)을 받아 주문 파이프라인으로 넘깁니다.
//! 본문 파싱/검증 실패는 422, 파이프라인 에러는 `error::execution_error` 매핑을 따릅니다.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use relay_core::{order_type, Side};
use relay_execution::{ExecutionResult, SignalRequest};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use crate::error::{execution_error, validation_error, ApiResult};
use crate::state::AppState;

fn validate_action(value: &str) -> Result<(), ValidationError> {
    if value.parse::<Side>().is_ok() {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_action")
            .with_message("action은 buy 또는 sell이어야 합니다".into()))
    }
}

fn validate_quantity(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative_quantity")
            .with_message("수량은 0 이상이어야 합니다".into()));
    }
    // 0은 최대 수량 자동 산출이므로 소수 수량이 0으로 내려가면 안 됨
    if !value.fract().is_zero() {
        return Err(ValidationError::new("fractional_quantity")
            .with_message("수량은 정수 주여야 합니다".into()));
    }
    if value.to_u64().is_none() {
        return Err(ValidationError::new("quantity_out_of_range")
            .with_message("수량이 허용 범위를 벗어났습니다".into()));
    }
    Ok(())
}

fn default_order_type() -> String {
    order_type::LIMIT.to_string()
}

/// 차트 알림 본문.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TradingViewAlert {
    /// "buy" | "sell"
    #[validate(custom(function = "validate_action"))]
    pub action: String,

    /// 종목 코드/티커
    #[validate(length(min = 1, max = 20, message = "심볼은 1-20자여야 합니다"))]
    pub symbol: String,

    /// 주문 수량 (0이면 최대 수량)
    #[serde(default)]
    #[validate(custom(function = "validate_quantity"))]
    pub quantity: Decimal,

    /// 알림 시점 가격 (참고용, 주문 단가는 호가로 결정)
    #[serde(default)]
    pub price: Option<Decimal>,

    /// 주문구분 코드
    #[serde(default = "default_order_type")]
    pub order_type: String,

    /// 시장 구분 (`korea`면 국내)
    #[serde(default)]
    pub market: Option<String>,

    /// 거래소 라벨
    #[serde(default, alias = "exchange_code")]
    pub exchange: Option<String>,

    /// 차트 타임프레임 (로그용)
    #[serde(default)]
    pub timeframe: Option<String>,
}

impl TradingViewAlert {
    /// 검증된 알림을 파이프라인 입력으로 변환.
    pub fn to_signal(&self) -> ApiResult<SignalRequest> {
        let side = self
            .action
            .parse::<Side>()
            .map_err(|e| validation_error(e.to_string()))?;
        if !self.quantity.fract().is_zero() {
            return Err(validation_error("수량은 정수 주여야 합니다"));
        }
        let quantity = self
            .quantity
            .to_u64()
            .ok_or_else(|| validation_error("수량이 허용 범위를 벗어났습니다"))?;

        Ok(SignalRequest {
            market: self.market.clone(),
            exchange: self.exchange.clone(),
            symbol: self.symbol.trim().to_uppercase(),
            side,
            quantity,
            order_type: Some(self.order_type.clone()),
        })
    }
}

/// 검증 에러를 한 줄 메시지로 합칩니다.
fn join_validation_errors(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// POST /api/v1/webhook/tradingview
pub async fn tradingview_webhook(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<ExecutionResult>> {
    info!(payload = %body, "Received webhook");

    let alert: TradingViewAlert =
        serde_json::from_value(body).map_err(|e| validation_error(e.to_string()))?;

    if let Err(errors) = alert.validate() {
        let message = join_validation_errors(&errors);
        warn!(%message, "Webhook validation failed");
        return Err(validation_error(message));
    }

    let signal = alert.to_signal()?;
    info!(
        symbol = %signal.symbol,
        exchange = ?signal.exchange,
        market = ?signal.market,
        side = %signal.side,
        quantity = signal.quantity,
        timeframe = ?alert.timeframe,
        "Placing order from webhook"
    );

    let result = state
        .pipeline
        .resolve_and_execute(signal)
        .await
        .map_err(execution_error)?;

    Ok(Json(result))
}

/// 웹훅 라우터 생성.
pub fn webhook_router() -> Router<Arc<AppState>> {
    Router::new().route("/tradingview", post(tradingview_webhook))
}
