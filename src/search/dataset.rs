use std::{fmt, fs, path::Path};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::index::TickerRecord;

// Row-oriented company dump: a header row naming the columns and one
// array per company, e.g. {"fields":["cik","name","ticker","exchange"],
// "data":[[320193,"Apple Inc.","AAPL","NASDAQ"], ...]}
#[derive(Debug, Deserialize)]
struct CompanyDataset {
  fields: Vec<String>,
  data: Vec<Vec<Value>>,
}

#[derive(Debug)]
pub enum DatasetError {
  Io(std::io::Error),
  Json(serde_json::Error),
  MissingColumn(String),
}

impl fmt::Display for DatasetError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(err) => {
        write!(f, "Failed to read company dataset: {}", err)
      },
      Self::Json(err) => {
        write!(f, "Failed to parse company dataset: {}", err)
      },
      Self::MissingColumn(column) => {
        write!(f, "Company dataset has no \"{}\" column", column)
      }
    }
  }
}

impl From<std::io::Error> for DatasetError {
  fn from(value: std::io::Error) -> Self {
    DatasetError::Io(value)
  }
}

impl From<serde_json::Error> for DatasetError {
  fn from(value: serde_json::Error) -> Self {
    DatasetError::Json(value)
  }
}

fn column_index(fields: &[String], name: &str) -> Result<usize, DatasetError> {
  fields
    .iter()
    .position(|f| f == name)
    .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
}

fn record_from_row(row: &[Value], cik: usize, name: usize, ticker: usize, exchange: usize) -> Option<TickerRecord> {
  Some(TickerRecord {
    cik: row.get(cik)?.as_u64()?,
    name: row.get(name)?.as_str()?.to_string(),
    ticker: row.get(ticker)?.as_str()?.to_string(),
    exchange: row.get(exchange)?.as_str()?.to_string(),
  })
}

pub fn parse_records(contents: &str) -> Result<Vec<TickerRecord>, DatasetError> {
  let dataset: CompanyDataset = serde_json::from_str(contents)?;

  let cik = column_index(&dataset.fields, "cik")?;
  let name = column_index(&dataset.fields, "name")?;
  let ticker = column_index(&dataset.fields, "ticker")?;
  let exchange = column_index(&dataset.fields, "exchange")?;

  let mut records = Vec::with_capacity(dataset.data.len());
  let mut skipped = 0;

  for row in &dataset.data {
    match record_from_row(row, cik, name, ticker, exchange) {
      Some(record) => records.push(record),
      None => skipped += 1,
    }
  }

  if skipped > 0 {
    warn!("skipped {} malformed rows in company dataset", skipped);
  }
  Ok(records)
}

pub fn load_records(path: &Path) -> Result<Vec<TickerRecord>, DatasetError> {
  let contents = fs::read_to_string(path)?;
  parse_records(&contents)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_rows_using_the_header_order() {
    // columns deliberately shuffled relative to the struct
    let json = r#"{
      "fields": ["ticker", "cik", "exchange", "name"],
      "data": [["AAPL", 320193, "NASDAQ", "Apple Inc."]]
    }"#;
    let records = parse_records(json).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0], TickerRecord::new(320193, "Apple Inc.", "AAPL", "NASDAQ"));
  }

  #[test]
  fn malformed_rows_are_skipped_not_fatal() {
    let json = r#"{
      "fields": ["cik", "name", "ticker", "exchange"],
      "data": [
        [320193, "Apple Inc.", "AAPL", "NASDAQ"],
        ["not-a-cik", "Broken Co", "BRK", "NYSE"],
        [789019, "Microsoft Corporation"],
        [789019, "Microsoft Corporation", "MSFT", "NASDAQ"]
      ]
    }"#;
    let records = parse_records(json).unwrap();
    let tickers: Vec<&str> = records.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["AAPL", "MSFT"]);
  }

  #[test]
  fn missing_column_is_a_startup_error() {
    let json = r#"{"fields": ["cik", "name", "ticker"], "data": []}"#;
    match parse_records(json) {
      Err(DatasetError::MissingColumn(col)) => assert_eq!(col, "exchange"),
      other => panic!("expected MissingColumn, got {:?}", other),
    }
  }

  #[test]
  fn invalid_json_is_reported() {
    assert!(matches!(parse_records("{"), Err(DatasetError::Json(_))));
  }
}
