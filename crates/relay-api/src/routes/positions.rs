//! 잔고 조회 및 일괄 축소 endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use relay_core::{AccountBalance, Position};
use relay_execution::ReductionReport;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::{surface, VenueQuery};
use crate::error::{execution_error, ApiResult};
use crate::state::AppState;

/// `reduce-all` 쿼리.
#[derive(Debug, Default, Deserialize)]
pub struct ReduceAllQuery {
    /// 축소 비율 (없으면 설정값)
    pub ratio: Option<Decimal>,
}

/// GET /api/v1/positions
pub async fn list_positions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VenueQuery>,
) -> ApiResult<Json<Vec<Position>>> {
    let venue = query.venue()?;
    let positions = surface(state.broker.positions(&venue).await)?;
    Ok(Json(positions))
}

/// GET /api/v1/positions/balance
///
/// 보유 종목과 계좌 전체 평가손익.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VenueQuery>,
) -> ApiResult<Json<AccountBalance>> {
    let venue = query.venue()?;
    let balance = surface(state.broker.balance(&venue).await)?;
    Ok(Json(balance))
}

/// POST /api/v1/positions/reduce-all
///
/// 종목별 결과를 모두 담아 200으로 응답합니다. 잔고 조회 실패는
/// 보고서의 `status: "error"`로 드러납니다.
pub async fn reduce_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReduceAllQuery>,
) -> ApiResult<Json<ReductionReport>> {
    let ratio = query.ratio.unwrap_or(state.reduction_ratio);
    info!(%ratio, "Manual position reduction requested");

    let report = state
        .pipeline
        .reduce_all_positions(ratio)
        .await
        .map_err(execution_error)?;

    Ok(Json(report))
}

/// 포지션 라우터 생성.
pub fn positions_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_positions))
        .route("/balance", get(get_balance))
        .route("/reduce-all", post(reduce_all))
}

#[cfg(test)]
mod tests {
    use crate::testing::{create_test_state, get, post_empty, send, FakeBrokerage};
    use axum::http::StatusCode;
    use relay_exchange::ExchangeError;
    use rust_decimal_macros::dec;

    fn broker() -> FakeBrokerage {
        FakeBrokerage::default()
            .with_quote("AAPL", dec!(150.05), dec!(150.00))
            .with_quote("NVDA", dec!(120.10), dec!(120.00))
            .with_position("NASD", "AAPL", dec!(100))
            .with_position("NASD", "TSLA", dec!(5))
            .with_position("NASD", "NVDA", dec!(3))
    }

    #[tokio::test]
    async fn test_reduce_all_reports_each_position() {
        let mut broker = broker();
        broker.failing_quotes.insert("TSLA".to_string());
        let submitted = broker.submitted.clone();

        let (status, body) = send(
            create_test_state(broker),
            post_empty("/api/v1/positions/reduce-all"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["ratio"], "0.5");

        let outcomes = body["outcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0]["status"], "success");
        assert_eq!(outcomes[0]["quantity"], 50);
        assert_eq!(outcomes[1]["status"], "failed");
        assert_eq!(outcomes[2]["status"], "success");
        assert_eq!(outcomes[2]["quantity"], 2);

        assert_eq!(submitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reduce_all_with_explicit_ratio() {
        let broker = broker();
        let submitted = broker.submitted.clone();

        let (status, _) = send(
            create_test_state(broker),
            post_empty("/api/v1/positions/reduce-all?ratio=1"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let orders = submitted.lock().unwrap();
        assert_eq!(orders[0].quantity, 100);
    }

    #[tokio::test]
    async fn test_reduce_all_rejects_out_of_range_ratio() {
        let (status, body) = send(
            create_test_state(broker()),
            post_empty("/api/v1/positions/reduce-all?ratio=2"),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_listing_failure_is_error_status() {
        let broker = FakeBrokerage {
            positions_error: Some(|| ExchangeError::Timeout("balance".to_string())),
            ..broker()
        };

        let (status, body) = send(
            create_test_state(broker),
            post_empty("/api/v1/positions/reduce-all"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_positions() {
        let (status, body) = send(
            create_test_state(broker()),
            get("/api/v1/positions?exchange=NASDAQ"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);
        assert_eq!(body[0]["symbol"], "AAPL");
    }

    #[tokio::test]
    async fn test_balance_sums_position_pnl() {
        let mut broker = broker();
        broker.positions[0].unrealized_pnl = dec!(1000);
        broker.positions[1].unrealized_pnl = dec!(-20.5);

        let (status, body) = send(create_test_state(broker), get("/api/v1/positions/balance")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["positions"].as_array().unwrap().len(), 3);
        assert_eq!(body["total_pnl"], "979.5");
    }

    #[tokio::test]
    async fn test_list_positions_failure_is_bad_gateway() {
        let broker = FakeBrokerage {
            positions_error: Some(|| ExchangeError::NetworkError("reset".to_string())),
            ..FakeBrokerage::default()
        };

        let (status, body) = send(create_test_state(broker), get("/api/v1/positions")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "BROKER_UNAVAILABLE");
    }
}
