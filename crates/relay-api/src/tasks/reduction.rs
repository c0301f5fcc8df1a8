//! 일일 포지션 축소 스케줄러.
//!
//! 설정된 현지 시각(기본: 한국시간 04:00, 미국장 마감 무렵)까지 잠든 뒤
//! 보유 해외 종목을 설정 비율만큼 일괄 매도합니다. 실행 결과는 로그로만 남깁니다.

use std::sync::Arc;

use chrono::{DateTime, Days, TimeZone, Utc};
use chrono_tz::Tz;
use relay_core::ReductionConfig;
use relay_execution::{OrderPipeline, ReductionStatus};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// `now` 이후 가장 가까운 `hour:minute` (타임존 기준) 시각.
///
/// 해당 시각이 존재하지 않는 날(DST 전환)은 건너뜁니다.
pub fn next_run_after(now: DateTime<Utc>, hour: u32, minute: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(&tz).date_naive();

    (0..=2).find_map(|offset| {
        let date = today.checked_add_days(Days::new(offset))?;
        let local = date.and_hms_opt(hour, minute, 0)?;
        let at = tz.from_local_datetime(&local).earliest()?.with_timezone(&Utc);
        (at > now).then_some(at)
    })
}

/// 축소 스케줄러를 시작합니다.
///
/// 비활성화되어 있거나 타임존이 잘못되었으면 `None`을 반환합니다.
pub fn start_reduction_scheduler(
    pipeline: Arc<OrderPipeline>,
    config: ReductionConfig,
    shutdown_token: CancellationToken,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("Position reduction scheduler disabled");
        return None;
    }

    let tz = match config.tz() {
        Ok(tz) => tz,
        Err(e) => {
            error!(error = %e, "Invalid reduction timezone, scheduler not started");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        info!(
            hour = config.hour,
            minute = config.minute,
            timezone = %tz,
            ratio = %config.ratio,
            "Position reduction scheduler started"
        );

        loop {
            let now = Utc::now();
            let Some(next) = next_run_after(now, config.hour, config.minute, tz) else {
                error!("Could not compute next reduction time, scheduler stopped");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next.with_timezone(&tz), "Next position reduction scheduled");

            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    info!("Position reduction scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            match pipeline.reduce_all_positions(config.ratio).await {
                Ok(report) if report.status == ReductionStatus::Success => {
                    info!(
                        succeeded = report.succeeded(),
                        failed = report.failed(),
                        total = report.outcomes.len(),
                        "Scheduled position reduction completed"
                    );
                }
                Ok(report) => {
                    warn!(
                        errors = ?report.errors,
                        succeeded = report.succeeded(),
                        "Scheduled position reduction finished with listing errors"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Scheduled position reduction failed");
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_next_run_later_today() {
        // KST 2026-03-10 02:00
        let now = utc("2026-03-09T17:00:00Z");
        let next = next_run_after(now, 4, 0, chrono_tz::Asia::Seoul).unwrap();
        assert_eq!(next, utc("2026-03-09T19:00:00Z"));
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        // KST 2026-03-10 04:00 정각이면 다음 날
        let now = utc("2026-03-09T19:00:00Z");
        let next = next_run_after(now, 4, 0, chrono_tz::Asia::Seoul).unwrap();
        assert_eq!(next, utc("2026-03-10T19:00:00Z"));
    }

    #[test]
    fn test_next_run_skips_missing_local_time() {
        // 2026-03-08 02:30은 뉴욕에 존재하지 않음 (DST 시작)
        let now = utc("2026-03-08T05:00:00Z");
        let next = next_run_after(now, 2, 30, chrono_tz::America::New_York).unwrap();
        assert_eq!(next, utc("2026-03-09T06:30:00Z"));
    }

    #[tokio::test]
    async fn test_disabled_scheduler_does_not_start() {
        let state = crate::testing::create_test_state(crate::testing::FakeBrokerage::default());
        let config = ReductionConfig {
            enabled: false,
            ..ReductionConfig::default()
        };
        assert!(
            start_reduction_scheduler(state.pipeline.clone(), config, CancellationToken::new())
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_cancel() {
        let state = crate::testing::create_test_state(crate::testing::FakeBrokerage::default());
        let token = CancellationToken::new();
        let handle =
            start_reduction_scheduler(state.pipeline.clone(), ReductionConfig::default(), token.clone())
                .unwrap();

        token.cancel();
        handle.await.unwrap();
    }
}
