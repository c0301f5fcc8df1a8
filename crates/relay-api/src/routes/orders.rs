//! 수동 주문, 단건/일괄 취소, 미체결 조회 endpoint.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use relay_core::{order_type, OpenOrder, OrderAck, OrderRequest, Side};
use relay_exchange::CancelSweepReport;
use relay_execution::{ExecutionResult, SignalRequest};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::{surface, VenueQuery};
use crate::error::{exchange_error, execution_error, not_found, validation_error, ApiResult};
use crate::state::AppState;

/// 수동 주문 요청.
///
/// `price`가 있으면 그 단가로 바로 제출하고, 없으면 호가 기준으로
/// 스프레드를 건너는 단가를 정합니다.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, alias = "exchange_code")]
    pub exchange: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub order_type: Option<String>,
}

/// 단건 취소 요청.
#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, alias = "exchange_code")]
    pub exchange: Option<String>,
    /// 원주문번호
    pub order_no: String,
}

/// 일괄 취소 요청.
#[derive(Debug, Default, Deserialize)]
pub struct CancelAllRequest {
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, alias = "exchange_code")]
    pub exchange: Option<String>,
    /// 취소하지 않을 종목
    #[serde(default)]
    pub skip_symbols: Vec<String>,
}

/// POST /api/v1/orders
///
/// 수량은 1 이상이어야 합니다. 최대 수량 주문은 웹훅으로만 받습니다.
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaceOrderRequest>,
) -> ApiResult<Json<ExecutionResult>> {
    if request.quantity == 0 {
        return Err(validation_error("주문 수량은 1 이상이어야 합니다"));
    }
    let venue = VenueQuery {
        market: request.market.clone(),
        exchange: request.exchange.clone(),
    }
    .venue()?;

    let result = match request.price {
        Some(price) => {
            let order = OrderRequest {
                venue,
                symbol: request.symbol,
                side: request.side,
                quantity: request.quantity,
                price,
                order_type: request
                    .order_type
                    .unwrap_or_else(|| order_type::LIMIT.to_string()),
            };
            state.pipeline.place_order(order).await
        }
        None => {
            state
                .pipeline
                .resolve_and_execute(SignalRequest {
                    market: request.market,
                    exchange: request.exchange.or_else(|| Some("NASDAQ".to_string())),
                    symbol: request.symbol.trim().to_uppercase(),
                    side: request.side,
                    quantity: request.quantity,
                    order_type: request.order_type,
                })
                .await
        }
    };

    Ok(Json(result.map_err(execution_error)?))
}

/// POST /api/v1/orders/cancel
///
/// 미체결 목록에서 원주문을 찾아 잔량 전부를 취소합니다.
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CancelOrderRequest>,
) -> ApiResult<Json<OrderAck>> {
    let venue = VenueQuery {
        market: request.market,
        exchange: request.exchange,
    }
    .venue()?;

    let orders = surface(state.broker.open_orders(&venue).await)?;
    let order = orders
        .into_iter()
        .find(|o| o.order_no == request.order_no)
        .ok_or_else(|| {
            not_found(
                "ORDER_NOT_FOUND",
                format!("미체결 주문이 없습니다: {}", request.order_no),
            )
        })?;

    info!(venue = %venue, order_no = %order.order_no, symbol = %order.symbol, "Cancelling order");
    let ack = state
        .broker
        .cancel_order(&venue, &order)
        .await
        .map_err(exchange_error)?;
    Ok(Json(ack))
}

/// GET /api/v1/orders/open
pub async fn list_open_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VenueQuery>,
) -> ApiResult<Json<Vec<OpenOrder>>> {
    let venue = query.venue()?;
    let orders = surface(state.broker.open_orders(&venue).await)?;
    Ok(Json(orders))
}

/// POST /api/v1/orders/cancel-all
///
/// 개별 취소 실패는 보고서에 담기며 응답은 200입니다.
pub async fn cancel_all(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CancelAllRequest>,
) -> ApiResult<Json<CancelSweepReport>> {
    let venue = VenueQuery {
        market: request.market,
        exchange: request.exchange,
    }
    .venue()?;
    let skip: HashSet<String> = request.skip_symbols.into_iter().collect();

    info!(venue = %venue, skip = skip.len(), "Cancelling all open orders");
    let report = state.broker.cancel_all(&venue, &skip).await;
    Ok(Json(report))
}

/// 주문 라우터 생성.
pub fn orders_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(place_order))
        .route("/cancel", post(cancel_order))
        .route("/open", get(list_open_orders))
        .route("/cancel-all", post(cancel_all))
}
