use std::fmt;

use serde::{Deserialize, Serialize};

/// Account details as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Option<i64>,
    pub email: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub role: Option<String>,
}

impl UserProfile {
    /// Name for display, falling back to the email address
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if !name.is_empty() {
            name
        } else {
            self.email.clone().unwrap_or_else(|| "Unknown user".to_string())
        }
    }
}

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn new(name: &str, email: &str, password: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body returned by the login and register endpoints.
///
/// The service has shipped two shapes: the profile nested under `user`, and
/// the profile fields flattened next to the token. Both are accepted.
#[derive(Clone, Default, Deserialize)]
pub struct AuthResponse {
    pub token: Option<String>,
    #[serde(rename = "type")]
    pub token_type: Option<String>,
    pub user: Option<UserProfile>,
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
    pub email: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    /// Token lifetime in milliseconds
    #[serde(rename = "expiresIn")]
    pub expires_in: Option<i64>,
}

impl AuthResponse {
    pub fn profile(&self) -> Option<UserProfile> {
        if let Some(ref user) = self.user {
            return Some(user.clone());
        }
        if self.user_id.is_none() && self.email.is_none() {
            return None;
        }
        Some(UserProfile {
            id: self.user_id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: None,
        })
    }
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("profile", &self.profile())
            .field("expires_in", &self.expires_in)
            .finish()
    }
}
