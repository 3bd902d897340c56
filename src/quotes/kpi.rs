use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::provider::extract_num;

fn optional_num<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(value.as_ref().and_then(extract_num))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryDetail {
  #[serde(deserialize_with = "optional_num")]
  pub market_cap: Option<Decimal>,
  #[serde(rename = "trailingPE", deserialize_with = "optional_num")]
  pub trailing_pe: Option<Decimal>,
  #[serde(deserialize_with = "optional_num")]
  pub price_to_sales_trailing_12_months: Option<Decimal>,
  #[serde(deserialize_with = "optional_num")]
  pub dividend_yield: Option<Decimal>,
  #[serde(deserialize_with = "optional_num")]
  pub beta: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyStatistics {
  #[serde(deserialize_with = "optional_num")]
  pub trailing_eps: Option<Decimal>,
  #[serde(deserialize_with = "optional_num")]
  pub profit_margins: Option<Decimal>,
  #[serde(deserialize_with = "optional_num")]
  pub short_ratio: Option<Decimal>,
}

/// The two summary modules the KPI strip reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteSummary {
  pub summary_detail: Option<SummaryDetail>,
  pub default_key_statistics: Option<KeyStatistics>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KpiFormat {
  MarketCap,
  Percent,
  Number,
  Price,
  Raw,
}

/// One KPI tile: a label, a typed accessor into the summary, and how to
/// render the value. Accessors replace any by-name field lookup, so a
/// typo is a compile error instead of a silent N/A.
pub struct Kpi {
  pub label: &'static str,
  pub accessor: fn(&QuoteSummary) -> Option<Decimal>,
  pub format: KpiFormat,
}

fn detail(summary: &QuoteSummary) -> Option<&SummaryDetail> {
  summary.summary_detail.as_ref()
}

fn stats(summary: &QuoteSummary) -> Option<&KeyStatistics> {
  summary.default_key_statistics.as_ref()
}

fn market_cap(q: &QuoteSummary) -> Option<Decimal> {
  detail(q).and_then(|d| d.market_cap)
}

fn trailing_pe(q: &QuoteSummary) -> Option<Decimal> {
  detail(q).and_then(|d| d.trailing_pe)
}

fn trailing_eps(q: &QuoteSummary) -> Option<Decimal> {
  stats(q).and_then(|s| s.trailing_eps)
}

fn profit_margins(q: &QuoteSummary) -> Option<Decimal> {
  stats(q).and_then(|s| s.profit_margins)
}

fn price_to_sales(q: &QuoteSummary) -> Option<Decimal> {
  detail(q).and_then(|d| d.price_to_sales_trailing_12_months)
}

fn dividend_yield(q: &QuoteSummary) -> Option<Decimal> {
  detail(q).and_then(|d| d.dividend_yield)
}

fn short_ratio(q: &QuoteSummary) -> Option<Decimal> {
  stats(q).and_then(|s| s.short_ratio)
}

fn beta(q: &QuoteSummary) -> Option<Decimal> {
  detail(q).and_then(|d| d.beta)
}

pub const KPIS: [Kpi; 8] = [
  Kpi { label: "Market Cap", accessor: market_cap, format: KpiFormat::MarketCap },
  Kpi { label: "P/E Ratio", accessor: trailing_pe, format: KpiFormat::Number },
  Kpi { label: "EPS", accessor: trailing_eps, format: KpiFormat::Price },
  Kpi { label: "Profit Margins", accessor: profit_margins, format: KpiFormat::Percent },
  Kpi { label: "Price/Sales", accessor: price_to_sales, format: KpiFormat::Number },
  Kpi { label: "Dividend Yield", accessor: dividend_yield, format: KpiFormat::Percent },
  Kpi { label: "Short Ratio", accessor: short_ratio, format: KpiFormat::Raw },
  Kpi { label: "Beta", accessor: beta, format: KpiFormat::Number },
];

const NOT_AVAILABLE: &str = "N/A";

fn format_market_cap(value: Decimal) -> String {
  let trillion = Decimal::from(1_000_000_000_000u64);
  let billion = Decimal::from(1_000_000_000u64);
  let million = Decimal::from(1_000_000u64);

  if value.is_zero() {
    NOT_AVAILABLE.to_string()
  } else if value >= trillion {
    format!("${:.2}T", value / trillion)
  } else if value >= billion {
    format!("${:.2}B", value / billion)
  } else if value >= million {
    format!("${:.2}M", value / million)
  } else {
    format!("${}", value)
  }
}

fn format_percent(value: Decimal) -> String {
  format!("{:.2}%", value * Decimal::from(100))
}

fn format_number(value: Decimal) -> String {
  format!("{:.2}", value)
}

// currency with thousands separators, e.g. $1,234.57
fn format_price(value: Decimal) -> String {
  let sign = if value.is_sign_negative() { "-" } else { "" };
  let fixed = format!("{:.2}", value.abs());
  let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

  let digits: Vec<char> = int_part.chars().collect();
  let mut grouped = String::new();
  for (i, ch) in digits.iter().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(*ch);
  }

  format!("{}${}.{}", sign, grouped, frac_part)
}

pub fn format_kpi(kpi: &Kpi, summary: &QuoteSummary) -> String {
  match (kpi.accessor)(summary) {
    None => NOT_AVAILABLE.to_string(),
    Some(value) => match kpi.format {
      KpiFormat::MarketCap => format_market_cap(value),
      KpiFormat::Percent => format_percent(value),
      KpiFormat::Number => format_number(value),
      KpiFormat::Price => format_price(value),
      KpiFormat::Raw => value.to_string(),
    },
  }
}

/// Label/value pair as sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiValue {
  pub label: &'static str,
  pub value: String,
}

pub fn kpi_values(summary: &QuoteSummary) -> Vec<KpiValue> {
  KPIS
    .iter()
    .map(|kpi| KpiValue { label: kpi.label, value: format_kpi(kpi, summary) })
    .collect()
}
