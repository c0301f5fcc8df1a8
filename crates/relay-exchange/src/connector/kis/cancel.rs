//! 미체결 주문 일괄 취소.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use relay_core::OpenOrder;
use serde::Serialize;
use tracing::{info, warn};

use crate::{ExchangeError, Fetched};

/// 취소 요청 사이 대기 시간 (KIS 초당 거래건수 제한).
pub const CANCEL_INTERVAL: Duration = Duration::from_millis(20);

/// 일괄 취소 결과 요약.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CancelSweepReport {
    /// 취소된 주문번호
    pub cancelled: Vec<String>,
    /// 건너뛴 주문번호
    pub skipped: Vec<String>,
    /// 실패한 주문 (주문번호, 사유)
    pub failed: Vec<(String, String)>,
    /// 미체결 조회 자체의 실패 사유
    pub listing_error: Option<String>,
}

impl CancelSweepReport {
    /// 실패 없이 끝났는지 확인.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.listing_error.is_none()
    }
}

/// 미체결 목록을 순서대로 취소합니다.
///
/// 개별 실패는 기록만 하고 다음 주문으로 넘어갑니다.
pub(crate) async fn sweep<F, Fut>(
    listing: Fetched<Vec<OpenOrder>>,
    skip: &HashSet<String>,
    interval: Duration,
    mut cancel: F,
) -> CancelSweepReport
where
    F: FnMut(OpenOrder) -> Fut,
    Fut: Future<Output = Result<(), ExchangeError>>,
{
    let skip: HashSet<String> = skip.iter().map(|s| s.to_uppercase()).collect();
    let (orders, listing_error) = listing.into_parts();

    let mut report = CancelSweepReport {
        listing_error: listing_error.map(|e| e.to_string()),
        ..Default::default()
    };

    let mut first = true;
    for order in orders {
        if skip.contains(&order.symbol.to_uppercase()) {
            info!(symbol = %order.symbol, order_no = %order.order_no, "Skipping cancel");
            report.skipped.push(order.order_no);
            continue;
        }

        if !first {
            tokio::time::sleep(interval).await;
        }
        first = false;

        let order_no = order.order_no.clone();
        let symbol = order.symbol.clone();
        match cancel(order).await {
            Ok(()) => {
                info!(symbol = %symbol, order_no = %order_no, "Order cancelled");
                report.cancelled.push(order_no);
            }
            Err(e) => {
                warn!(symbol = %symbol, order_no = %order_no, error = %e, "Cancel failed");
                report.failed.push((order_no, e.to_string()));
            }
        }
    }

    report
}
