use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::UserProfile;

/// Non-empty bearer token. The value is opaque and never parsed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Returns `None` for empty or whitespace-only input
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Anonymous,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Loading => "loading",
            SessionStatus::Authenticated => "authenticated",
            SessionStatus::Anonymous => "anonymous",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub token: AccessToken,
    pub profile: Option<UserProfile>,
    /// When this process entered the authenticated state
    pub since: DateTime<Utc>,
}

/// Snapshot of the controller's session state.
///
/// A token exists exactly when the session is `Authenticated`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Session {
    #[default]
    Loading,
    Authenticated(SessionData),
    Anonymous,
}

impl Session {
    pub fn authenticated(token: AccessToken, profile: Option<UserProfile>) -> Self {
        Session::Authenticated(SessionData {
            token,
            profile,
            since: Utc::now(),
        })
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            Session::Loading => SessionStatus::Loading,
            Session::Authenticated(_) => SessionStatus::Authenticated,
            Session::Anonymous => SessionStatus::Anonymous,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Session::Authenticated(data) => Some(data.token.as_str()),
            _ => None,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Session::Authenticated(data) => data.profile.as_ref(),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Session::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }
}
