//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kantor_core::store::{CredentialStore, MemoryStore, StorageError};
use kantor_core::{ApiClient, RequestPipeline, SessionController};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Memory store whose operations can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
    pub fail_remove: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            inner: MemoryStore::with_entries([(kantor_core::store::TOKEN_KEY, token)]),
            ..Default::default()
        }
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable(format!("{} disabled by test", op)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CredentialStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::check(&self.fail_get, "get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::check(&self.fail_set, "set")?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        Self::check(&self.fail_remove, "remove")?;
        self.inner.remove(keys).await
    }
}

pub fn base_url(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

pub fn pipeline(server: &MockServer, store: Arc<dyn CredentialStore>, timeout: Duration) -> Arc<RequestPipeline> {
    let pipeline = RequestPipeline::new(&base_url(server), timeout, store)
        .expect("Failed to build pipeline")
        .with_initial_backoff(Duration::from_millis(10));
    Arc::new(pipeline)
}

/// Controller wired to the mock server through the given store
pub fn controller(server: &MockServer, store: Arc<dyn CredentialStore>) -> Arc<SessionController> {
    let api = ApiClient::new(pipeline(server, store.clone(), Duration::from_secs(5)));
    SessionController::new(store, api)
}

pub async fn mock_login_success(server: &MockServer, token: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "token": token,
                    "type": "Bearer",
                    "userId": 1,
                    "email": "a@x.com",
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "expiresIn": 86400000
                }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

pub async fn mock_login_rejected(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": 401,
            "error": "Unauthorized",
            "message": "Invalid email or password",
            "path": "/api/users/login"
        })))
        .mount(server)
        .await;
}
