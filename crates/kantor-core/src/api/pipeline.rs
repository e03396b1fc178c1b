//! Request pipeline shared by every call to the exchange service.
//!
//! Outgoing requests marked [`Access::Authenticated`] get the stored bearer
//! token attached. A 401 on such a request is reported to every registered
//! [`RejectionObserver`] before the error is returned to the caller.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::ApiError;
use crate::store::{CredentialStore, TOKEN_KEY};

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay for rate limiting, doubled on every retry.
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Whether a request should carry the stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Sent without a credential; rejections are returned as-is
    Public,
    /// Carries the stored bearer token when one exists
    Authenticated,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    access: Access,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            access: Access::Authenticated,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        let mut request = Self::new(Method::POST, path);
        request.body = Some(body);
        Ok(request)
    }

    /// Mark the request as not requiring a credential
    pub fn public(mut self) -> Self {
        self.access = Access::Public;
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn access(&self) -> Access {
        self.access
    }
}

/// Buffered response from a successful request.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    /// Like [`ApiResponse::json`], but an empty body yields `T::default()`
    pub fn json_or_default<T: DeserializeOwned + Default>(&self) -> Result<T, ApiError> {
        if self.is_empty() {
            Ok(T::default())
        } else {
            self.json()
        }
    }
}

/// Receives the token the server just rejected.
///
/// The pipeline awaits every observer before returning the failed request,
/// so by the time the caller sees [`ApiError::AuthRejected`] the observers
/// have finished reacting.
#[async_trait]
pub trait RejectionObserver: Send + Sync {
    async fn credential_rejected(&self, token: &str);
}

pub struct RequestPipeline {
    client: Client,
    base_url: String,
    timeout: Duration,
    initial_backoff: Duration,
    store: Arc<dyn CredentialStore>,
    observers: Mutex<Vec<Weak<dyn RejectionObserver>>>,
}

impl RequestPipeline {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            initial_backoff: INITIAL_BACKOFF,
            store,
            observers: Mutex::new(Vec::new()),
        })
    }

    /// Override the first rate-limit backoff delay
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register an observer for credential rejections.
    ///
    /// Only a weak handle is kept; observers that have been dropped are
    /// pruned on the next rejection.
    pub fn register_observer(&self, observer: Weak<dyn RejectionObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Current token from the store. A failed read means "no token".
    async fn stored_token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY).await {
            Ok(Some(token)) if !token.trim().is_empty() => Some(token),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read credential, sending request unauthenticated");
                None
            }
        }
    }

    async fn notify_rejected(&self, token: &str) {
        let observers: Vec<Arc<dyn RejectionObserver>> = {
            let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        debug!(observers = observers.len(), "Notifying credential rejection");
        for observer in observers {
            observer.credential_rejected(token).await;
        }
    }

    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url(&request.path);
        let token = match request.access {
            Access::Public => None,
            Access::Authenticated => self.stored_token().await,
        };

        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut builder = self
                .client
                .request(request.method.clone(), &url)
                .header(header::ACCEPT, "application/json");
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(ref body) = request.body {
                builder = builder.json(body);
            }
            if let Some(ref token) = token {
                builder = builder.bearer_auth(token);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| ApiError::from_transport(e, self.timeout))?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| ApiError::from_transport(e, self.timeout))?;

            if status.is_success() {
                debug!(method = %request.method, url = %url, status = status.as_u16(), "Request succeeded");
                return Ok(ApiResponse {
                    status: status.as_u16(),
                    body: body.to_vec(),
                });
            }

            let error = ApiError::from_status(status, &String::from_utf8_lossy(&body));
            if error.is_auth_rejected() {
                match token {
                    Some(ref token) => {
                        warn!(url = %url, "Server rejected the stored credential");
                        self.notify_rejected(token).await;
                    }
                    None => debug!(url = %url, "Unauthorized response to a request without credential"),
                }
            } else {
                debug!(method = %request.method, url = %url, status = status.as_u16(), error = %error, "Request failed");
            }
            return Err(error);
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(&request).await?.json()
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(&ApiRequest::post(path, body)?).await?.json()
    }
}
