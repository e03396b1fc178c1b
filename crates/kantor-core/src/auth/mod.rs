//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionController`: the session state machine and sole store writer
//! - `Session`: snapshot of the current state (`Loading`, `Authenticated`, `Anonymous`)
//!
//! The controller subscribes to the request pipeline, so a credential the
//! server rejects is cleared before the failing request returns.

pub mod controller;
pub mod session;

pub use controller::{LoginError, RegisterError, SessionController};
pub use session::{AccessToken, Session, SessionData, SessionStatus};
