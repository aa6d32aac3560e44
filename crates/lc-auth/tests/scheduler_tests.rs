//! Refresh scheduler behaviour against a scripted token endpoint.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use lc_auth::{
    AuthError, AuthResult, Credential, CredentialStore, RefreshScheduler, TickSource,
    TokenRefresher, TokenResponse,
};
use serde_json::json;
use tokio::sync::mpsc;

fn jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

fn token_expiring_in(secs: i64, refresh_token: &str) -> TokenResponse {
    TokenResponse {
        access_token: jwt(&json!({ "exp": Utc::now().timestamp() + secs, "sub": "user" })),
        token_type: "bearer".into(),
        expires_in: u64::try_from(secs).ok(),
        refresh_token: Some(refresh_token.into()),
        scope: None,
    }
}

fn token_without_expiry() -> TokenResponse {
    TokenResponse {
        access_token: jwt(&json!({ "sub": "user" })),
        token_type: "bearer".into(),
        expires_in: None,
        refresh_token: None,
        scope: None,
    }
}

#[derive(Default)]
struct ScriptedRefresher {
    responses: Mutex<VecDeque<AuthResult<TokenResponse>>>,
    seen_refresh_tokens: Mutex<Vec<String>>,
}

impl ScriptedRefresher {
    fn new(responses: Vec<AuthResult<TokenResponse>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            seen_refresh_tokens: Mutex::default(),
        })
    }

    fn calls(&self) -> usize {
        self.seen_refresh_tokens.lock().unwrap().len()
    }

    fn seen(&self) -> Vec<String> {
        self.seen_refresh_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        self.seen_refresh_tokens
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::RefreshFailed("script exhausted".into())))
    }
}

fn store() -> CredentialStore {
    CredentialStore::new(Credential::new("bearer initial").with_refresh_token("refresh-0"))
}

fn assert_close(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_secs(2),
        "expected ~{expected:?}, got {actual:?}"
    );
}

async fn wait_for_calls(refresher: &ScriptedRefresher, calls: usize) {
    for _ in 0..200 {
        if refresher.calls() >= calls {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("refresher saw {} calls, wanted {calls}", refresher.calls());
}

#[tokio::test]
async fn start_refreshes_immediately_and_publishes() {
    let refresher = ScriptedRefresher::new(vec![Ok(token_expiring_in(1000, "refresh-1"))]);
    let store = store();
    let (_tick_tx, tick_rx) = mpsc::channel(1);

    let handle = RefreshScheduler::new(refresher.clone(), store.clone())
        .start(TickSource::External(tick_rx))
        .await
        .expect("start");

    assert_eq!(refresher.seen(), vec!["refresh-0".to_string()]);
    assert_ne!(store.load().access_token(), "initial");
    assert_eq!(store.load().refresh_token(), Some("refresh-1"));
    assert_close(handle.next_refresh_in(), Duration::from_secs(900));

    handle.shutdown().await;
}

#[tokio::test]
async fn external_tick_refreshes_and_reschedules_from_new_expiry() {
    let refresher = ScriptedRefresher::new(vec![
        Ok(token_expiring_in(1000, "refresh-1")),
        Ok(token_expiring_in(2000, "refresh-2")),
    ]);
    let store = store();
    let (tick_tx, tick_rx) = mpsc::channel(1);

    let handle = RefreshScheduler::new(refresher.clone(), store.clone())
        .start(TickSource::External(tick_rx))
        .await
        .expect("start");
    let first_token = store.load().access_token().to_string();

    tick_tx.send(()).await.expect("tick");
    wait_for_calls(&refresher, 2).await;
    for _ in 0..200 {
        if handle.next_refresh_in() > Duration::from_secs(1000) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(
        refresher.seen(),
        vec!["refresh-0".to_string(), "refresh-1".to_string()]
    );
    assert_ne!(store.load().access_token(), first_token);
    assert_eq!(store.load().refresh_token(), Some("refresh-2"));
    assert_close(handle.next_refresh_in(), Duration::from_secs(1800));

    handle.shutdown().await;
}

#[tokio::test]
async fn start_without_expiry_is_fatal() {
    let refresher = ScriptedRefresher::new(vec![Ok(token_without_expiry())]);
    let result = RefreshScheduler::new(refresher, store())
        .start(TickSource::Timer)
        .await;
    assert!(matches!(result, Err(AuthError::MissingExpiry)));
}

#[tokio::test]
async fn start_without_refresh_token_fails() {
    let refresher = ScriptedRefresher::new(vec![]);
    let store = CredentialStore::new(Credential::new("initial"));
    let result = RefreshScheduler::new(refresher.clone(), store)
        .start(TickSource::Timer)
        .await;
    assert!(matches!(result, Err(AuthError::NoRefreshToken)));
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn missing_expiry_after_tick_is_reported_on_fatal_channel() {
    let refresher = ScriptedRefresher::new(vec![
        Ok(token_expiring_in(1000, "refresh-1")),
        Ok(token_without_expiry()),
    ]);
    let (tick_tx, tick_rx) = mpsc::channel(1);

    let mut handle = RefreshScheduler::new(refresher.clone(), store())
        .start(TickSource::External(tick_rx))
        .await
        .expect("start");

    tick_tx.send(()).await.expect("tick");
    let err = tokio::time::timeout(Duration::from_secs(2), handle.fatal())
        .await
        .expect("fatal error in time");
    assert!(matches!(err, Some(AuthError::MissingExpiry)), "{err:?}");

    handle.shutdown().await;
    // The loop is gone: further ticks have nowhere to go.
    assert!(tick_tx.send(()).await.is_err());
    assert_eq!(refresher.calls(), 2);
}

#[tokio::test]
async fn refresh_rejection_after_tick_is_reported_on_fatal_channel() {
    let refresher = ScriptedRefresher::new(vec![
        Ok(token_expiring_in(1000, "refresh-1")),
        Err(AuthError::RefreshFailed("401 invalid_token".into())),
    ]);
    let (tick_tx, tick_rx) = mpsc::channel(1);

    let mut handle = RefreshScheduler::new(refresher, store())
        .start(TickSource::External(tick_rx))
        .await
        .expect("start");

    tick_tx.send(()).await.expect("tick");
    let err = tokio::time::timeout(Duration::from_secs(2), handle.fatal())
        .await
        .expect("fatal error in time");
    assert!(
        matches!(&err, Some(AuthError::RefreshFailed(msg)) if msg.contains("401")),
        "{err:?}"
    );
}

#[tokio::test]
async fn stop_ends_loop_without_error() {
    let refresher = ScriptedRefresher::new(vec![Ok(token_expiring_in(1000, "refresh-1"))]);
    let (tick_tx, tick_rx) = mpsc::channel(1);

    let mut handle = RefreshScheduler::new(refresher.clone(), store())
        .start(TickSource::External(tick_rx))
        .await
        .expect("start");

    handle.stop();
    let outcome = tokio::time::timeout(Duration::from_secs(2), handle.fatal())
        .await
        .expect("loop ended");
    assert!(outcome.is_none());

    handle.shutdown().await;
    assert!(tick_tx.send(()).await.is_err());
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn closed_tick_source_ends_loop() {
    let refresher = ScriptedRefresher::new(vec![Ok(token_expiring_in(1000, "refresh-1"))]);
    let (tick_tx, tick_rx) = mpsc::channel(1);

    let mut handle = RefreshScheduler::new(refresher, store())
        .start(TickSource::External(tick_rx))
        .await
        .expect("start");

    drop(tick_tx);
    let outcome = tokio::time::timeout(Duration::from_secs(2), handle.fatal())
        .await
        .expect("loop ended");
    assert!(outcome.is_none());
}

#[tokio::test(start_paused = true)]
async fn timer_fires_at_ninety_percent_of_lifetime() {
    let refresher = ScriptedRefresher::new(vec![
        Ok(token_expiring_in(100, "refresh-1")),
        Ok(token_expiring_in(100, "refresh-2")),
    ]);

    let handle = RefreshScheduler::new(refresher.clone(), store())
        .start(TickSource::Timer)
        .await
        .expect("start");
    assert_close(handle.next_refresh_in(), Duration::from_secs(90));

    // Just short of the scheduled wake-up nothing has happened yet.
    tokio::time::sleep(Duration::from_secs(80)).await;
    assert_eq!(refresher.calls(), 1);

    tokio::time::sleep(Duration::from_secs(15)).await;
    wait_for_calls(&refresher, 2).await;
    assert_eq!(
        refresher.seen(),
        vec!["refresh-0".to_string(), "refresh-1".to_string()]
    );

    handle.shutdown().await;
}
