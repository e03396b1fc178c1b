use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Buy/sell quote for one currency against PLN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub currency: Option<String>,
    #[serde(rename = "currencyName")]
    pub currency_name: Option<String>,
    pub code: Option<String>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    #[serde(rename = "midRate")]
    pub mid_rate: Option<f64>,
    #[serde(rename = "rateDate")]
    pub rate_date: Option<NaiveDate>,
}

impl ExchangeRate {
    /// Currency code, falling back to the currency field (older payloads
    /// put the code there)
    pub fn code_display(&self) -> &str {
        self.code
            .as_deref()
            .or(self.currency.as_deref())
            .unwrap_or("?")
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }
}
