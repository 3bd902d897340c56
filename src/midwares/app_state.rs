use std::env;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

// Per-request identity attached by the auth midware.
#[derive(Clone)]
pub struct RequestContext {
  pub user_id: String,
  pub remote_ip: String,
  pub timestamp: String,
  pub signature: String,
}

#[derive(Debug, Serialize, Clone)]
pub enum AppError {
  Unauthorized(String),
  InternalError(String),
}

impl IntoResponse for AppError {
  fn into_response(self) -> axum::response::Response {
    let (status, message) = match self {
      Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
      Self::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
    };

    let body = Json(json!({"error": message, "code": status.as_u16()}));

    (status, body).into_response()
  }
}

/// Environment-driven configuration, resolved once at startup.
#[derive(Clone)]
pub struct Config {
  pub bind_addr: String,
  pub database_url: String,
  pub hmac_key: String,
  pub dataset_path: String,
  pub quote_api_url: String,
}

impl Config {
  pub fn from_env() -> Result<Self, AppError> {
    Ok(Config {
      bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:7575".to_string()),
      database_url: require("DATABASE_URL")?,
      hmac_key: require("HMAC_KEY")?,
      dataset_path: env::var("TICKER_DATASET")
        .unwrap_or_else(|_| "data/company_tickers_exchange.json".to_string()),
      quote_api_url: require("QUOTE_API_URL")?,
    })
  }
}

fn require(name: &str) -> Result<String, AppError> {
  env::var(name).map_err(|_| AppError::InternalError(format!("{} must be set", name)))
}
