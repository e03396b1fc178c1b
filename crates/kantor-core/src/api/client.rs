//! API client for the exchange service REST endpoints.
//!
//! This module provides the `ApiClient` struct: one typed method per
//! endpoint, all routed through the shared [`RequestPipeline`].

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use super::pipeline::{ApiRequest, RequestPipeline};
use super::ApiError;
use crate::models::{
    AuthResponse, ExchangeRate, ExchangeRequest, LoginRequest, RegisterRequest, TopUpRequest,
    Transaction, TransactionPage, UserProfile, Wallet,
};

/// Default page size for transaction history
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Typed access to the exchange service.
/// Clone is cheap - the pipeline is shared.
#[derive(Clone)]
pub struct ApiClient {
    pipeline: Arc<RequestPipeline>,
}

impl ApiClient {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    // ===== Authentication (public) =====

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        debug!(email = %request.email, "Sending login request");
        let req = ApiRequest::post("/users/login", request)?.public();
        self.pipeline.send(&req).await?.json()
    }

    /// Register a new account. The service may answer with an empty body.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        debug!(email = %request.email, "Sending registration request");
        let req = ApiRequest::post("/users/register", request)?.public();
        self.pipeline.send(&req).await?.json_or_default()
    }

    pub async fn health(&self) -> Result<String, ApiError> {
        let req = ApiRequest::get("/users/health").public();
        Ok(self.pipeline.send(&req).await?.text())
    }

    // ===== Account =====

    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        self.pipeline.get_json(ApiRequest::get("/users/me")).await
    }

    // ===== Wallets =====

    pub async fn wallets(&self) -> Result<Vec<Wallet>, ApiError> {
        self.pipeline.get_json(ApiRequest::get("/wallets/me")).await
    }

    pub async fn top_up(&self, amount: f64) -> Result<Wallet, ApiError> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(ApiError::InvalidRequest(format!(
                "Top-up amount must be positive, got {}",
                amount
            )));
        }
        self.pipeline
            .post_json("/wallets/topup", &TopUpRequest { amount })
            .await
    }

    pub async fn exchange(&self, request: &ExchangeRequest) -> Result<Transaction, ApiError> {
        if request.from_currency == request.to_currency {
            return Err(ApiError::InvalidRequest(
                "Source and target currency must differ".to_string(),
            ));
        }
        self.pipeline.post_json("/exchange", request).await
    }

    // ===== History =====

    pub async fn transaction_history(
        &self,
        page: u32,
        size: u32,
    ) -> Result<TransactionPage, ApiError> {
        let req = ApiRequest::get("/transactions/history")
            .query("page", page)
            .query("size", size);
        self.pipeline.get_json(req).await
    }

    // ===== Exchange rates =====

    pub async fn current_rates(&self) -> Result<Vec<ExchangeRate>, ApiError> {
        self.pipeline.get_json(ApiRequest::get("/rates/current")).await
    }

    pub async fn rate(&self, code: &str) -> Result<ExchangeRate, ApiError> {
        let path = format!("/rates/currency/{}", Self::currency_code(code)?);
        self.pipeline.get_json(ApiRequest::get(path)).await
    }

    pub async fn rate_history(
        &self,
        code: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ExchangeRate>, ApiError> {
        let mut req = ApiRequest::get(format!("/rates/history/{}", Self::currency_code(code)?));
        if let Some(from) = from {
            req = req.query("from", from.format("%Y-%m-%d"));
        }
        if let Some(to) = to {
            req = req.query("to", to.format("%Y-%m-%d"));
        }
        self.pipeline.get_json(req).await
    }

    /// Validate that a string looks like an ISO 4217 code (three letters).
    fn currency_code(code: &str) -> Result<String, ApiError> {
        let code = code.trim().to_uppercase();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(code)
        } else {
            Err(ApiError::InvalidRequest(format!("Invalid currency code: {:?}", code)))
        }
    }
}
