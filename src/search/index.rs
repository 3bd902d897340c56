use std::collections::HashSet;
use serde::{Deserialize, Serialize};

use super::trie::Trie;

/// One row of the company dataset. Built once at startup and never
/// mutated afterwards; `cik` is the unique company identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerRecord {
  pub cik: u64,
  pub name: String,
  pub ticker: String,
  pub exchange: String,
}

impl TickerRecord {
  pub fn new(cik: u64, name: &str, ticker: &str, exchange: &str) -> Self {
    TickerRecord {
      cik,
      name: name.to_string(),
      ticker: ticker.to_string(),
      exchange: exchange.to_string(),
    }
  }
}

/// Shown when the search box is empty, instead of querying the tries.
pub fn default_suggestions() -> Vec<TickerRecord> {
  vec![
    TickerRecord::new(320193, "Apple Inc.", "AAPL", "NASDAQ"),
    TickerRecord::new(789019, "Microsoft Corporation", "MSFT", "NASDAQ"),
    TickerRecord::new(1018724, "Amazon.com Inc.", "AMZN", "NASDAQ"),
    TickerRecord::new(1326801, "Meta Platforms Inc.", "META", "NASDAQ"),
    TickerRecord::new(1652044, "Alphabet Inc.", "GOOGL", "NASDAQ"),
    TickerRecord::new(1318605, "Tesla Inc.", "TSLA", "NASDAQ"),
  ]
}

/// Company lookup over two tries built from the same dataset, one keyed
/// by display name and one by ticker symbol. Constructed once and shared
/// behind an Arc; there is no global instance.
pub struct SearchIndex {
  name_trie: Trie<TickerRecord>,
  ticker_trie: Trie<TickerRecord>,
}

impl SearchIndex {
  pub fn build(records: &[TickerRecord]) -> Self {
    let mut name_trie = Trie::new();
    let mut ticker_trie = Trie::new();

    for record in records {
      name_trie.insert(&record.name.to_lowercase(), record.clone());
      ticker_trie.insert(&record.ticker.to_lowercase(), record.clone());
    }

    SearchIndex { name_trie, ticker_trie }
  }

  /// Fan a query out to both tries and merge. Name matches come first,
  /// duplicates (same cik found via both keys) keep their first
  /// occurrence, and the merged order is never re-sorted.
  pub fn suggestions(&self, term: &str, limit: usize) -> Vec<TickerRecord> {
    if term.trim().is_empty() {
      return default_suggestions();
    }

    let mut combined = self.name_trie.get_suggestions(term, limit);
    combined.extend(self.ticker_trie.get_suggestions(term, limit));

    let mut seen = HashSet::new();
    combined.retain(|record| seen.insert(record.cik));
    combined
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_index() -> SearchIndex {
    SearchIndex::build(&[
      TickerRecord::new(320193, "Apple Inc.", "AAPL", "NASDAQ"),
      TickerRecord::new(1045810, "Nvidia Corp", "NVDA", "NASDAQ"),
      TickerRecord::new(2488, "Advanced Micro Devices Inc", "AMD", "NASDAQ"),
      TickerRecord::new(1018724, "Amazon.com Inc.", "AMZN", "NASDAQ"),
    ])
  }

  #[test]
  fn record_found_via_both_keys_appears_once() {
    let index = sample_index();
    // "a" matches Apple/AMD/Amazon by name and AAPL/AMD/AMZN by ticker
    let results = index.suggestions("a", 50);
    let apple_hits = results.iter().filter(|r| r.cik == 320193).count();
    assert_eq!(apple_hits, 1);
    let amd_hits = results.iter().filter(|r| r.cik == 2488).count();
    assert_eq!(amd_hits, 1);
  }

  #[test]
  fn name_matches_precede_ticker_only_matches() {
    let index = sample_index();
    let results = index.suggestions("n", 50);
    // "nvidia corp" by name, then NVDA would be a duplicate; nothing else
    // starts with "n" by ticker except NVDA itself
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].ticker, "NVDA");

    // "am" matches Amazon by name and AMD + AMZN by ticker; the name
    // match leads, then ticker-only matches in character order
    let results = index.suggestions("am", 50);
    let tickers: Vec<&str> = results.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["AMZN", "AMD"]);
  }

  #[test]
  fn blank_query_returns_the_fixed_defaults_without_searching() {
    let index = SearchIndex::build(&[]);
    assert_eq!(index.suggestions("", 50), default_suggestions());
    assert_eq!(index.suggestions("   ", 50), default_suggestions());
    assert_eq!(index.suggestions("\t", 5), default_suggestions());
  }

  #[test]
  fn query_case_does_not_change_results() {
    let index = sample_index();
    assert_eq!(index.suggestions("AAPL", 10), index.suggestions("aapl", 10));
    assert_eq!(index.suggestions("Apple", 10), index.suggestions("aPPLE", 10));
  }

  #[test]
  fn limit_applies_to_each_trie_before_the_union() {
    let index = sample_index();
    let results = index.suggestions("a", 1);
    // one from the name trie plus at most one new from the ticker trie
    assert!(results.len() <= 2);
    assert!(!results.is_empty());
  }
}
