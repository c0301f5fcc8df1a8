//! 현재가/호가/매수가능/주문 가능 수량 조회 endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use relay_core::{BuyingPower, Quote, Venue};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{surface, VenueQuery};
use crate::error::{execution_error, not_found, validation_error, ApiResult};
use crate::state::AppState;
use relay_execution::ExecutionError;

/// 주문 가능 수량 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuantityResponse {
    pub venue: Venue,
    pub symbol: String,
    pub quantity: u64,
}

/// 현재가 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    pub venue: Venue,
    pub symbol: String,
    pub price: Decimal,
}

/// 매수가능 조회 쿼리.
#[derive(Debug, Deserialize)]
pub struct BuyingPowerQuery {
    pub market: Option<String>,
    pub exchange: Option<String>,
    /// 주문 단가
    pub price: Decimal,
}

/// GET /api/v1/market/price/{symbol}
pub async fn get_price(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<VenueQuery>,
) -> ApiResult<Json<PriceResponse>> {
    let venue = query.venue()?;
    let symbol = symbol.to_uppercase();
    let price = surface(state.broker.last_price(&venue, &symbol).await)?
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| not_found("PRICE_UNAVAILABLE", format!("현재가 정보가 없습니다: {}", symbol)))?;

    Ok(Json(PriceResponse {
        venue,
        symbol,
        price,
    }))
}

/// GET /api/v1/market/quotes/{symbol}
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<VenueQuery>,
) -> ApiResult<Json<Quote>> {
    let venue = query.venue()?;
    let symbol = symbol.to_uppercase();
    let quote = surface(state.broker.quote(&venue, &symbol).await)?;

    quote.map(Json).ok_or_else(|| {
        execution_error(ExecutionError::QuoteUnavailable {
            symbol,
            reason: "호가 정보가 없습니다".to_string(),
        })
    })
}

/// GET /api/v1/market/buying-power/{symbol}?price=
pub async fn get_buying_power(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<BuyingPowerQuery>,
) -> ApiResult<Json<BuyingPower>> {
    if query.price <= Decimal::ZERO {
        return Err(validation_error("price는 0보다 커야 합니다"));
    }
    let venue = VenueQuery {
        market: query.market,
        exchange: query.exchange,
    }
    .venue()?;

    let power = surface(
        state
            .broker
            .buying_power(&venue, &symbol.to_uppercase(), query.price)
            .await,
    )?;
    Ok(Json(power.unwrap_or_default()))
}

/// GET /api/v1/market/quantity/max-buy/{symbol}
pub async fn get_max_buy(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<VenueQuery>,
) -> ApiResult<Json<QuantityResponse>> {
    let venue = query.venue()?;
    let symbol = symbol.to_uppercase();
    let quantity = surface(state.pipeline.resolver().max_buy(&venue, &symbol).await)?;
    Ok(Json(QuantityResponse {
        venue,
        symbol,
        quantity,
    }))
}

/// GET /api/v1/market/quantity/max-sell/{symbol}
pub async fn get_max_sell(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<VenueQuery>,
) -> ApiResult<Json<QuantityResponse>> {
    let venue = query.venue()?;
    let symbol = symbol.to_uppercase();
    let quantity = surface(state.pipeline.resolver().max_sell(&venue, &symbol).await)?;
    Ok(Json(QuantityResponse {
        venue,
        symbol,
        quantity,
    }))
}

/// 시세 라우터 생성.
pub fn market_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/price/{symbol}", get(get_price))
        .route("/quotes/{symbol}", get(get_quote))
        .route("/buying-power/{symbol}", get(get_buying_power))
        .route("/quantity/max-buy/{symbol}", get(get_max_buy))
        .route("/quantity/max-sell/{symbol}", get(get_max_sell))
}
