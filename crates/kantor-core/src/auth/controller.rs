//! Session state machine.
//!
//! `SessionController` owns the in-memory [`Session`] and is the only writer
//! of the credential store. Every transition (restore, login commit, logout,
//! rejection) runs under a single async lock; network round-trips happen
//! outside it so a logout never waits on a slow login.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::session::{AccessToken, Session, SessionStatus};
use crate::api::{ApiClient, ApiError, RejectionObserver};
use crate::models::{LoginRequest, RegisterRequest, UserProfile};
use crate::store::{CredentialStore, StorageError, TOKEN_KEY, USER_KEY};

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Another login or registration is already in progress")]
    Busy,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Server accepted the credentials but returned no token")]
    MissingToken,

    #[error("Failed to persist credential: {0}")]
    Storage(#[from] StorageError),

    #[error("Logged out while the login was in flight")]
    Superseded,
}

#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("Another login or registration is already in progress")]
    Busy,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Clears the in-flight flag when the operation finishes, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    api: ApiClient,
    state: watch::Sender<Session>,
    /// Transition lock. Holds the logout generation: a login that started
    /// under an older generation must not commit.
    generation: Mutex<u64>,
    in_flight: AtomicBool,
}

impl SessionController {
    /// Create the controller and subscribe it to credential rejections
    /// reported by the client's pipeline.
    pub fn new(store: Arc<dyn CredentialStore>, api: ApiClient) -> Arc<Self> {
        let (state, _) = watch::channel(Session::Loading);
        let controller = Arc::new(Self {
            store,
            api,
            state,
            generation: Mutex::new(0),
            in_flight: AtomicBool::new(false),
        });

        let observer: Weak<dyn RejectionObserver> = Arc::downgrade(&controller) as Weak<SessionController>;
        controller.api.pipeline().register_observer(observer);
        controller
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Current session snapshot
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.state.borrow().profile().cloned()
    }

    /// Receiver notified on every session transition
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Wait until the session has left `Loading`
    pub async fn ready(&self) -> Session {
        let mut rx = self.state.subscribe();
        let session = match rx.wait_for(|s| !s.is_loading()).await {
            Ok(session) => session.clone(),
            Err(_) => self.session(),
        };
        session
    }

    fn publish(&self, session: Session) {
        debug!(status = %session.status(), "Session transition");
        self.state.send_replace(session);
    }

    /// Read the persisted credential and settle into `Authenticated` or
    /// `Anonymous`. Storage failures are treated as "no session".
    pub async fn restore_session(&self) -> Session {
        let _transition = self.generation.lock().await;

        let token = match self.store.get(TOKEN_KEY).await {
            Ok(value) => value.and_then(AccessToken::new),
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential, starting anonymous");
                None
            }
        };

        let session = match token {
            Some(token) => {
                let profile = self.load_profile().await;
                info!(has_profile = profile.is_some(), "Session restored");
                Session::authenticated(token, profile)
            }
            None => {
                debug!("No stored credential");
                Session::Anonymous
            }
        };

        self.publish(session.clone());
        session
    }

    async fn load_profile(&self) -> Option<UserProfile> {
        match self.store.get(USER_KEY).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(error = %e, "Ignoring corrupt stored profile");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored profile");
                None
            }
        }
    }

    /// Log in and report success as a boolean. Never fails otherwise.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        match self.try_login(email, password).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Login failed");
                false
            }
        }
    }

    /// Log in, reporting why it failed.
    ///
    /// On any error the stored credential and the session are unchanged.
    pub async fn try_login(&self, email: &str, password: &str) -> Result<(), LoginError> {
        let _in_flight = InFlight::acquire(&self.in_flight).ok_or(LoginError::Busy)?;
        let started_at = *self.generation.lock().await;

        let response = self.api.login(&LoginRequest::new(email, password)).await?;
        let token = response
            .token
            .clone()
            .and_then(AccessToken::new)
            .ok_or(LoginError::MissingToken)?;
        let profile = response.profile();

        let generation = self.generation.lock().await;
        if *generation != started_at {
            info!("Discarding login result completed after logout");
            return Err(LoginError::Superseded);
        }

        self.store.set(TOKEN_KEY, token.as_str()).await?;
        self.persist_profile(profile.as_ref()).await;

        info!(email = %email.trim(), "Logged in");
        self.publish(Session::authenticated(token, profile));
        drop(generation);
        Ok(())
    }

    /// Best effort: a missing profile only costs a display name.
    async fn persist_profile(&self, profile: Option<&UserProfile>) {
        let result = match profile {
            Some(profile) => match serde_json::to_string(profile) {
                Ok(json) => self.store.set(USER_KEY, &json).await,
                Err(e) => Err(e.into()),
            },
            None => self.store.remove(&[USER_KEY]).await,
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist user profile");
        }
    }

    /// Register an account and report success as a boolean.
    ///
    /// Registration never authenticates the session; callers route the user
    /// to `login` afterwards.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> bool {
        match self.try_register(name, email, password).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Registration failed");
                false
            }
        }
    }

    pub async fn try_register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), RegisterError> {
        let _in_flight = InFlight::acquire(&self.in_flight).ok_or(RegisterError::Busy)?;

        let response = self
            .api
            .register(&RegisterRequest::new(name, email, password))
            .await?;
        if response.token.is_some() {
            debug!("Discarding token returned by registration");
        }

        info!(email = %email.trim(), "Registered");
        Ok(())
    }

    /// Clear the stored credential and become `Anonymous`.
    ///
    /// Local state always wins: a failing delete is logged and ignored.
    pub async fn logout(&self) {
        let mut generation = self.generation.lock().await;
        *generation += 1;

        if let Err(e) = self.store.remove(&[TOKEN_KEY, USER_KEY]).await {
            warn!(error = %e, "Failed to remove stored credential during logout");
        }

        info!("Logged out");
        self.publish(Session::Anonymous);
    }
}

#[async_trait]
impl RejectionObserver for SessionController {
    async fn credential_rejected(&self, token: &str) {
        let _transition = self.generation.lock().await;

        // A rejection of a token we no longer hold says nothing about the
        // current session.
        let current = self.state.borrow().token().map(str::to_string);
        if current.is_some_and(|current| current != token) {
            debug!("Ignoring rejection of a superseded credential");
            return;
        }

        if let Err(e) = self.store.remove(&[TOKEN_KEY, USER_KEY]).await {
            warn!(error = %e, "Failed to remove rejected credential");
        }

        warn!("Credential rejected by server, session cleared");
        self.publish(Session::Anonymous);
    }
}
