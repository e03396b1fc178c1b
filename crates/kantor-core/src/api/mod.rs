//! REST API module for the exchange service.
//!
//! This module provides the `RequestPipeline` every outbound call goes
//! through, and the `ApiClient` with one typed method per endpoint.
//!
//! The service uses bearer token authentication; tokens are obtained from
//! the public `/users/login` endpoint.

pub mod client;
pub mod error;
pub mod pipeline;

pub use client::ApiClient;
pub use error::ApiError;
pub use pipeline::{Access, ApiRequest, ApiResponse, RejectionObserver, RequestPipeline};
