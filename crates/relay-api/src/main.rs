//! KIS 시그널 릴레이 서버.
//!
//! 차트 알림 웹훅을 받아 KIS 주문으로 변환하고, 매일 설정 시각에
//! 보유 해외 종목을 일괄 축소합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use relay_api::routes::create_api_router;
use relay_api::state::AppState;
use relay_api::tasks::start_reduction_scheduler;
use relay_core::{init_logging, AppConfig, LogConfig};
use relay_exchange::{KisConfig, KisGateway, KisOAuth, KisTransport};
use relay_execution::{OrderPipeline, PipelineConfig};

/// CORS 레이어.
///
/// `CORS_ORIGINS`(쉼표 구분)가 없으면 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                AllowOrigin::list(origins)
            }
        }
        _ => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("failed to load configuration")?;

    init_logging(LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!("Starting KIS signal relay...");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host / server.port")?;

    // 자격증명 누락은 기동 실패
    let kis_config = KisConfig::from_env().context("KIS configuration")?;
    info!(environment = ?kis_config.environment, "KIS configuration loaded");

    let oauth = Arc::new(KisOAuth::new(kis_config).context("KIS session")?);
    let token = oauth
        .initialize()
        .await
        .context("initial KIS token issuance failed")?;
    info!(expires_at = %token.expires_at, "KIS session ready");

    let transport = Arc::new(KisTransport::new(Arc::clone(&oauth)).context("KIS transport")?);
    let gateway = Arc::new(KisGateway::new(transport));

    let pipeline = Arc::new(OrderPipeline::new(gateway, PipelineConfig::default()));
    let state = Arc::new(
        AppState::new(Arc::clone(&pipeline), config.reduction.ratio).with_oauth(oauth),
    );

    let shutdown_token = CancellationToken::new();
    let scheduler = start_reduction_scheduler(
        pipeline,
        config.reduction.clone(),
        shutdown_token.clone(),
    );

    let app = create_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    info!(%addr, "API server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    if let Some(handle) = scheduler {
        if tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .is_err()
        {
            warn!("Scheduler did not stop in time, forcing shutdown");
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Ctrl+C 또는 SIGTERM을 기다린 뒤 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
}
