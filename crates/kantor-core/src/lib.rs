//! Core library for the kantor currency-exchange wallet client.
//!
//! The session controller, request pipeline and credential storage live
//! here; front ends only talk to [`Kantor`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod store;

use std::sync::Arc;

use anyhow::Result;

pub use api::{ApiClient, ApiError, RequestPipeline};
pub use auth::{Session, SessionController, SessionStatus};
pub use config::Config;
pub use store::{CredentialStore, StorageError};

/// One wired-up client: a pipeline over the given store, the typed API on
/// top of it, and the session controller subscribed to its rejections.
#[derive(Clone)]
pub struct Kantor {
    pub session: Arc<SessionController>,
    pub api: ApiClient,
}

impl Kantor {
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let pipeline = RequestPipeline::new(&config.base_url, config.timeout(), store.clone())?;
        let api = ApiClient::new(Arc::new(pipeline));
        let session = SessionController::new(store, api.clone());
        Ok(Self { session, api })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let store = config.open_store()?;
        Ok(Self::new(config, store)?)
    }
}
