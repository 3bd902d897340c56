use std::collections::{HashMap, HashSet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::kpi::QuoteSummary;

/// Per-symbol quote as the board consumes it. Every numeric field is
/// optional; whatever the provider leaves out renders as a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteData {
  pub symbol: String,
  pub price: Option<Decimal>,
  pub change: Option<Decimal>,
  pub change_percent: Option<Decimal>,
  pub pre_market_price: Option<Decimal>,
  pub pre_market_change: Option<Decimal>,
  pub pre_market_change_percent: Option<Decimal>,
  pub post_market_price: Option<Decimal>,
  pub post_market_change: Option<Decimal>,
  pub post_market_change_percent: Option<Decimal>,
}

impl QuoteData {
  fn placeholder(symbol: &str) -> Self {
    QuoteData {
      symbol: symbol.to_string(),
      price: None,
      change: None,
      change_percent: None,
      pre_market_price: None,
      pre_market_change: None,
      pre_market_change_percent: None,
      post_market_price: None,
      post_market_change: None,
      post_market_change_percent: None,
    }
  }
}

// Provider numerics show up either as a bare number or wrapped as
// {"raw": <number>, "fmt": "..."}. Anything else is treated as absent.
pub(crate) fn extract_num(value: &Value) -> Option<Decimal> {
  match value {
    Value::Number(n) => n.to_string().parse().ok(),
    Value::Object(map) => map.get("raw").and_then(extract_num),
    _ => None,
  }
}

// Raw provider shape; only the fields the board reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProviderQuote {
  symbol: Option<String>,
  regular_market_price: Option<Value>,
  regular_market_change: Option<Value>,
  regular_market_change_percent: Option<Value>,
  pre_market_price: Option<Value>,
  pre_market_change: Option<Value>,
  pre_market_change_percent: Option<Value>,
  post_market_price: Option<Value>,
  post_market_change: Option<Value>,
  post_market_change_percent: Option<Value>,
}

impl ProviderQuote {
  fn into_quote(self, requested: &str) -> QuoteData {
    let num = |v: &Option<Value>| v.as_ref().and_then(extract_num);
    QuoteData {
      symbol: self.symbol.clone().unwrap_or_else(|| requested.to_string()),
      price: num(&self.regular_market_price),
      change: num(&self.regular_market_change),
      change_percent: num(&self.regular_market_change_percent),
      pre_market_price: num(&self.pre_market_price),
      pre_market_change: num(&self.pre_market_change),
      pre_market_change_percent: num(&self.pre_market_change_percent),
      post_market_price: num(&self.post_market_price),
      post_market_change: num(&self.post_market_change),
      post_market_change_percent: num(&self.post_market_change_percent),
    }
  }
}

/// Thin client for the external financial-data provider. Quotes are
/// fetched one symbol at a time; a symbol that errors degrades to a
/// placeholder quote instead of failing the batch.
#[derive(Clone)]
pub struct QuoteClient {
  http: reqwest::Client,
  base_url: String,
}

impl QuoteClient {
  pub fn new(base_url: &str) -> Self {
    QuoteClient {
      http: reqwest::Client::new(),
      base_url: base_url.trim_end_matches('/').to_string(),
    }
  }

  async fn try_fetch(&self, symbol: &str) -> Result<QuoteData, reqwest::Error> {
    let url = format!("{}/quote/{}", self.base_url, symbol);
    let raw: ProviderQuote = self
      .http
      .get(&url)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;
    Ok(raw.into_quote(symbol))
  }

  pub async fn fetch_quotes(&self, tickers: &[String]) -> HashMap<String, QuoteData> {
    let mut seen = HashSet::new();
    let mut quotes = HashMap::new();

    for symbol in tickers {
      if !seen.insert(symbol.clone()) {
        continue;
      }
      let quote = match self.try_fetch(symbol).await {
        Ok(quote) => quote,
        Err(err) => {
          warn!("quote fetch for {} failed: {}", symbol, err);
          QuoteData::placeholder(symbol)
        }
      };
      quotes.insert(symbol.clone(), quote);
    }
    quotes
  }

  /// Fetch the summary modules backing the KPI strip. None on any
  /// provider error; the caller renders placeholders.
  pub async fn fetch_summary(&self, symbol: &str) -> Option<QuoteSummary> {
    let url = format!("{}/summary/{}", self.base_url, symbol);
    let result = async {
      self
        .http
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json::<QuoteSummary>()
        .await
    }
    .await;

    match result {
      Ok(summary) => Some(summary),
      Err(err) => {
        warn!("summary fetch for {} failed: {}", symbol, err);
        None
      }
    }
  }
}
