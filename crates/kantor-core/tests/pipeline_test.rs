//! Integration tests for the request pipeline and typed API client.
//!
//! The pipeline is exercised on its own here: rejection handling is
//! verified through a recording observer rather than a session controller.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{mock_login_rejected, pipeline};
use kantor_core::api::{ApiRequest, RejectionObserver};
use kantor_core::models::{ExchangeRequest, LoginRequest};
use kantor_core::store::{CredentialStore, MemoryStore, TOKEN_KEY};
use kantor_core::{ApiClient, ApiError, SessionController, SessionStatus};
use serde_json::json;
use tokio::sync::Mutex;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingObserver {
    rejected: Mutex<Vec<String>>,
}

#[async_trait]
impl RejectionObserver for RecordingObserver {
    async fn credential_rejected(&self, token: &str) {
        self.rejected.lock().await.push(token.to_string());
    }
}

fn store_with(token: &str) -> Arc<dyn CredentialStore> {
    Arc::new(MemoryStore::with_entries([(TOKEN_KEY, token)]))
}

fn api(server: &MockServer, store: Arc<dyn CredentialStore>) -> ApiClient {
    ApiClient::new(pipeline(server, store, Duration::from_secs(5)))
}

// ============================================================================
// Credential injection
// ============================================================================

#[tokio::test]
async fn test_authenticated_request_carries_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wallets/me"))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "currency": "PLN", "balance": 1000.0},
            {"id": 2, "currency": "USD", "balance": 24.5}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let wallets = api(&server, store_with("T1")).wallets().await.unwrap();
    assert_eq!(wallets.len(), 2);
    assert_eq!(wallets[1].display_balance(), "24.50 USD");
}

#[tokio::test]
async fn test_request_without_stored_token_is_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rates/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let rates = api(&server, Arc::new(MemoryStore::new())).current_rates().await.unwrap();
    assert!(rates.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_public_request_never_carries_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .and(body_json(json!({"email": "a@x.com", "password": "p1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T2"})))
        .mount(&server)
        .await;

    let client = api(&server, store_with("T1"));
    let resp = client.login(&LoginRequest::new("a@x.com", "p1")).await.unwrap();
    assert_eq!(resp.token.as_deref(), Some("T2"));

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

// ============================================================================
// Rejection
// ============================================================================

#[tokio::test]
async fn test_rejection_notifies_observer_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = api(&server, store_with("T1"));
    let observer = Arc::new(RecordingObserver::default());
    let handle: Arc<dyn RejectionObserver> = observer.clone();
    client.pipeline().register_observer(Arc::downgrade(&handle));

    let err = client.me().await.unwrap_err();
    assert!(matches!(err, ApiError::AuthRejected));
    assert_eq!(*observer.rejected.lock().await, vec!["T1".to_string()]);
}

#[tokio::test]
async fn test_rejection_without_token_does_not_notify() {
    let server = MockServer::start().await;
    mock_login_rejected(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = api(&server, Arc::new(MemoryStore::new()));
    let observer = Arc::new(RecordingObserver::default());
    let handle: Arc<dyn RejectionObserver> = observer.clone();
    client.pipeline().register_observer(Arc::downgrade(&handle));

    assert!(client.me().await.unwrap_err().is_auth_rejected());
    assert!(client
        .login(&LoginRequest::new("a@x.com", "wrong"))
        .await
        .unwrap_err()
        .is_auth_rejected());
    assert!(observer.rejected.lock().await.is_empty());
}

#[tokio::test]
async fn test_other_errors_do_not_notify() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = api(&server, store_with("T1"));
    let observer = Arc::new(RecordingObserver::default());
    let handle: Arc<dyn RejectionObserver> = observer.clone();
    client.pipeline().register_observer(Arc::downgrade(&handle));

    assert!(matches!(client.me().await, Err(ApiError::AccessDenied(_))));
    assert!(observer.rejected.lock().await.is_empty());
}

// ============================================================================
// Timeouts and retries
// ============================================================================

#[tokio::test]
async fn test_timeout_leaves_session_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wallets/me"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let store = store_with("T1");
    let client = ApiClient::new(pipeline(&server, store.clone(), Duration::from_millis(200)));
    let ctrl = SessionController::new(store.clone(), client);
    ctrl.restore_session().await;

    let err = ctrl.api().wallets().await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout(_)));
    assert_eq!(ctrl.status(), SessionStatus::Authenticated);
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("T1"));
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rates/current"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/rates/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"currency": "euro", "code": "EUR", "bid": 4.2, "ask": 4.3, "rateDate": "2025-01-15"}
        ])))
        .mount(&server)
        .await;

    let rates = api(&server, store_with("T1")).current_rates().await.unwrap();
    assert_eq!(rates.len(), 1);
    assert_eq!(rates[0].code_display(), "EUR");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_rate_limit_gives_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rates/current"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let err = api(&server, store_with("T1")).current_rates().await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimited));
}

// ============================================================================
// Typed endpoints
// ============================================================================

#[tokio::test]
async fn test_history_sends_paging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/transactions/history"))
        .and(query_param("page", "1"))
        .and(query_param("size", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"id": 5, "type": "SELL", "status": "PENDING"}],
            "totalPages": 2,
            "number": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = api(&server, store_with("T1"))
        .transaction_history(1, kantor_core::api::client::DEFAULT_PAGE_SIZE)
        .await
        .unwrap();
    assert_eq!(page.number, 1);
    assert_eq!(page.content[0].id, 5);
}

#[tokio::test]
async fn test_exchange_and_top_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/exchange"))
        .and(body_json(json!({"fromCurrency": "PLN", "toCurrency": "USD", "amount": 100.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7, "type": "BUY", "status": "COMPLETED",
            "fromCurrency": "PLN", "toCurrency": "USD", "fromAmount": 100.0, "toAmount": 24.5
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/wallets/topup"))
        .and(body_json(json!({"amount": 50.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "currency": "PLN", "balance": 150.0
        })))
        .mount(&server)
        .await;

    let client = api(&server, store_with("T1"));
    let tx = client.exchange(&ExchangeRequest::new("pln", "usd", 100.0)).await.unwrap();
    assert_eq!(tx.summary(), "100.00 PLN -> 24.50 USD");

    let wallet = client.top_up(50.0).await.unwrap();
    assert_eq!(wallet.balance, 150.0);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_locally() {
    let server = MockServer::start().await;
    let client = api(&server, store_with("T1"));

    assert!(matches!(client.top_up(-5.0).await, Err(ApiError::InvalidRequest(_))));
    assert!(matches!(client.top_up(f64::NAN).await, Err(ApiError::InvalidRequest(_))));
    assert!(matches!(
        client.exchange(&ExchangeRequest::new("PLN", "pln", 1.0)).await,
        Err(ApiError::InvalidRequest(_))
    ));
    assert!(matches!(client.rate("dollars").await, Err(ApiError::InvalidRequest(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_history_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rates/history/USD"))
        .and(query_param("from", "2025-01-01"))
        .and(query_param("to", "2025-01-31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"code": "USD", "midRate": 4.02, "rateDate": "2025-01-02"},
            {"code": "USD", "midRate": 4.05, "rateDate": "2025-01-03"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let from = chrono::NaiveDate::from_ymd_opt(2025, 1, 1);
    let to = chrono::NaiveDate::from_ymd_opt(2025, 1, 31);
    let history = api(&server, store_with("T1")).rate_history("usd", from, to).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_generic_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Authentication service is running"))
        .mount(&server)
        .await;

    let client = api(&server, store_with("T1"));
    assert_eq!(client.health().await.unwrap(), "Authentication service is running");

    let resp = client
        .pipeline()
        .send(&ApiRequest::get("users/health").public())
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn test_concurrent_rejections_end_anonymous() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wallets/me"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let store = store_with("T1");
    let ctrl = SessionController::new(store.clone(), api(&server, store.clone()));
    ctrl.restore_session().await;
    assert_eq!(ctrl.status(), SessionStatus::Authenticated);

    let results = futures::future::join_all((0..5).map(|_| ctrl.api().wallets())).await;
    assert!(results.iter().all(|r| matches!(r, Err(ApiError::AuthRejected))));
    assert_eq!(ctrl.status(), SessionStatus::Anonymous);
    assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
}
