use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Balance held in a single currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Option<i64>,
    pub currency: String,
    pub balance: f64,
}

impl Wallet {
    pub fn display_balance(&self) -> String {
        format!("{:.2} {}", self.balance, self.currency)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopUpRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRequest {
    #[serde(rename = "fromCurrency")]
    pub from_currency: String,
    #[serde(rename = "toCurrency")]
    pub to_currency: String,
    /// Amount of the source currency to spend
    pub amount: f64,
}

impl ExchangeRequest {
    pub fn new(from_currency: &str, to_currency: &str, amount: f64) -> Self {
        Self {
            from_currency: from_currency.trim().to_uppercase(),
            to_currency: to_currency.trim().to_uppercase(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Buy,
    Sell,
    Transfer,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    #[serde(rename = "fromCurrency")]
    pub from_currency: Option<String>,
    #[serde(rename = "toCurrency")]
    pub to_currency: Option<String>,
    #[serde(rename = "fromAmount")]
    pub from_amount: Option<f64>,
    #[serde(rename = "toAmount")]
    pub to_amount: Option<f64>,
    #[serde(alias = "exchangeRate")]
    pub rate: Option<f64>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<NaiveDateTime>,
}

impl Transaction {
    /// One-line summary, e.g. `100.00 PLN -> 24.50 USD`
    pub fn summary(&self) -> String {
        let side = |amount: Option<f64>, currency: &Option<String>| match (amount, currency) {
            (Some(a), Some(c)) => Some(format!("{:.2} {}", a, c)),
            (Some(a), None) => Some(format!("{:.2}", a)),
            _ => None,
        };

        match (
            side(self.from_amount, &self.from_currency),
            side(self.to_amount, &self.to_currency),
        ) {
            (Some(from), Some(to)) => format!("{} -> {}", from, to),
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => "-".to_string(),
        }
    }
}

/// One page of transaction history, newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPage {
    #[serde(default)]
    pub content: Vec<Transaction>,
    #[serde(rename = "totalPages", default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
}
