//! 세션/토큰 관리자 통합 테스트 (mockito HTTP 서버 사용).

use std::sync::Arc;

use chrono::{Duration, Utc};
use mockito::Server;
use relay_exchange::connector::kis::TokenCache;
use relay_exchange::{ExchangeError, KisConfig, KisEnvironment, KisOAuth, TokenState};

const TOKEN_BODY: &str = r#"{
    "access_token": "fresh-token",
    "token_type": "Bearer",
    "expires_in": 86400
}"#;

fn config(server: &Server) -> KisConfig {
    KisConfig::new("app-key", "app-secret", "12345678-01", KisEnvironment::Real)
        .with_base_url(server.url())
}

fn token(value: &str, valid_for: Duration) -> TokenState {
    TokenState::new(value.to_string(), "Bearer".to_string(), Utc::now() + valid_for)
}

#[tokio::test]
async fn cached_token_with_two_hours_left_is_reused() {
    let mut server = Server::new_async().await;
    let issuance = server
        .mock("POST", "/oauth2/tokenP")
        .with_status(200)
        .with_body(TOKEN_BODY)
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("token.json");
    TokenCache::new(&cache_path)
        .save(&token("cached-token", Duration::hours(2)))
        .await
        .unwrap();

    let oauth = KisOAuth::new(config(&server).with_token_cache(&cache_path)).unwrap();
    let initialized = oauth.initialize().await.unwrap();
    assert_eq!(initialized.access_token, "cached-token");

    let current = oauth.get_token().await.unwrap();
    assert_eq!(current.auth_header(), "Bearer cached-token");

    issuance.assert_async().await;
}

#[tokio::test]
async fn cached_token_with_thirty_minutes_left_is_reissued_once() {
    let mut server = Server::new_async().await;
    let issuance = server
        .mock("POST", "/oauth2/tokenP")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"grant_type": "client_credentials", "appkey": "app-key", "appsecret": "app-secret"}"#
                .to_string(),
        ))
        .with_status(200)
        .with_body(TOKEN_BODY)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("token.json");
    let cache = TokenCache::new(&cache_path);
    cache
        .save(&token("stale-token", Duration::minutes(30)))
        .await
        .unwrap();

    let oauth = KisOAuth::new(config(&server).with_token_cache(&cache_path)).unwrap();
    let initialized = oauth.initialize().await.unwrap();
    assert_eq!(initialized.access_token, "fresh-token");
    assert!(!initialized.is_expired_or_expiring());

    // 새 토큰은 디스크에도 기록됨
    let persisted = cache.load().await.unwrap();
    assert_eq!(persisted.access_token, "fresh-token");

    // 이후 호출은 네트워크 없이 재사용
    oauth.get_token().await.unwrap();
    issuance.assert_async().await;
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let mut server = Server::new_async().await;
    let issuance = server
        .mock("POST", "/oauth2/tokenP")
        .with_status(200)
        .with_body(TOKEN_BODY)
        .expect(1)
        .create_async()
        .await;

    let oauth = Arc::new(KisOAuth::new(config(&server)).unwrap());
    oauth
        .set_cached_token(token("expiring-token", Duration::minutes(10)))
        .await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let oauth = Arc::clone(&oauth);
            tokio::spawn(async move { oauth.get_token().await })
        })
        .collect();

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.access_token, "fresh-token");
    }

    issuance.assert_async().await;
}

#[tokio::test]
async fn expiry_is_read_from_kst_field() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/oauth2/tokenP")
        .with_status(200)
        .with_body(
            r#"{"access_token": "t", "token_type": "Bearer", "expires_in": 60,
                "access_token_token_expired": "2099-01-02 09:00:00"}"#,
        )
        .create_async()
        .await;

    let oauth = KisOAuth::new(config(&server)).unwrap();
    let token = oauth.initialize().await.unwrap();

    // KST 09:00 = UTC 00:00
    assert_eq!(token.expires_at.to_rfc3339(), "2099-01-02T00:00:00+00:00");
}

#[tokio::test]
async fn issuance_failure_is_unauthorized() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/oauth2/tokenP")
        .with_status(403)
        .with_body(r#"{"error_code": "EGW00103", "error_description": "유효하지 않은 AppKey입니다."}"#)
        .create_async()
        .await;

    let oauth = KisOAuth::new(config(&server)).unwrap();
    match oauth.initialize().await {
        Err(ExchangeError::Unauthorized(message)) => assert!(message.contains("AppKey")),
        other => panic!("expected Unauthorized, got {:?}", other),
    }
    assert!(!oauth.is_authenticated().await);
}

#[tokio::test]
async fn empty_credentials_fail_before_any_request() {
    let mut server = Server::new_async().await;
    let issuance = server
        .mock("POST", "/oauth2/tokenP")
        .expect(0)
        .create_async()
        .await;

    let config = KisConfig::new("", "secret", "12345678", KisEnvironment::Real)
        .with_base_url(server.url());
    let oauth = KisOAuth::new(config).unwrap();

    assert!(matches!(
        oauth.initialize().await,
        Err(ExchangeError::Configuration(_))
    ));
    issuance.assert_async().await;
}
