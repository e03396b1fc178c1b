//! Data models for the exchange service.
//!
//! This module contains the request and response types exchanged with
//! the REST service:
//!
//! - Auth types: `LoginRequest`, `RegisterRequest`, `AuthResponse`, `UserProfile`
//! - Wallet types: `Wallet`, `TopUpRequest`, `ExchangeRequest`
//! - History types: `Transaction`, `TransactionPage`
//! - `ExchangeRate`: bid/ask quotes per currency
//!
//! Amounts are carried exactly as the server reports them; the client never
//! computes balances or converts currencies itself.

pub mod rate;
pub mod user;
pub mod wallet;

pub use rate::ExchangeRate;
pub use user::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
pub use wallet::{
    ExchangeRequest, TopUpRequest, Transaction, TransactionPage, TransactionStatus,
    TransactionType, Wallet,
};
