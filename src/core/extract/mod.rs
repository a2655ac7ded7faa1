pub mod endesa;
pub mod iberdrola;

use crate::domain::model::{Bill, PeriodLabel};
use crate::utils::error::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

pub use endesa::EndesaExtractor;
pub use iberdrola::IberdrolaExtractor;

/// One issuer's bill layout. Extractors are pure functions of their input:
/// no side effects beyond parsing, and they own Bill construction
/// exclusively.
pub trait BillExtractor: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Parses one document into a Bill, or fails with `MalformedBill`
    /// naming the required field that could not be located. Rectification
    /// and credit bills (negative amounts) are valid output, never a parse
    /// failure.
    fn extract(&self, text: &str, source: &str) -> Result<Bill>;
}

// Spanish-locale money: optional sign, dot thousands, comma decimals,
// optional space before the euro sign. e.g. "-1.234,56 €".
static AMOUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[+-]?(?:\d{1,3}(?:\.\d{3})*|\d+),\d{2} ?€").unwrap()
});

static DMY_DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}/\d{2}/\d{4}").unwrap());

// Energy quantity with an explicit kWh unit, e.g. "220,00 kWh".
static KWH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:\d{1,3}(?:\.\d{3})*|\d+),\d{2}) ?kWh").unwrap()
});

/// Parses a Spanish-formatted number ("1.234,56", optionally with a euro
/// sign) into an f64.
pub(crate) fn parse_spanish_number(raw: &str) -> Option<f64> {
    let cleaned = raw.replace('€', "").replace([' ', '.'], "").replace(',', ".");
    cleaned.parse::<f64>().ok()
}

/// Extracts the billed amount from a line, requiring exactly one money
/// token on it; lines with zero or several amounts are ambiguous and yield
/// nothing.
pub(crate) fn single_amount(line: &str) -> Option<f64> {
    let mut found = AMOUNT_PATTERN.find_iter(line);
    let first = found.next()?;
    if found.next().is_some() {
        return None;
    }
    parse_spanish_number(first.as_str())
}

/// Reads the kWh quantity printed on a line. Energy fields are kWh, never
/// money; lines that only carry amounts yield nothing.
pub(crate) fn kwh_quantity(line: &str) -> Option<f64> {
    KWH_PATTERN
        .captures(line)
        .and_then(|c| parse_spanish_number(&c[1]))
}

/// Extracts every dd/mm/yyyy date on a line, in order.
pub(crate) fn dmy_dates(line: &str) -> Vec<NaiveDate> {
    DMY_DATE_PATTERN
        .find_iter(line)
        .filter_map(|m| NaiveDate::parse_from_str(m.as_str(), "%d/%m/%Y").ok())
        .collect()
}

/// A per-period consumption row as printed on an invoice, either in the
/// six-period form ("P4 1.18.4 1.278,00 2.578,00 1,00 0,00 1.300,00", the
/// consumption being the last column) or the legacy three-period form
/// ("... Punta 120,00 340,00 1,00 0,00 220,00").
static PX_ROW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(P[1-6]) 1\.18\.[1-6](?: (?:\d{1,3}(?:\.\d{3})*|\d+),\d{2}){4} ((?:\d{1,3}(?:\.\d{3})*|\d+),\d{2}).*",
    )
    .unwrap()
});

static PV_ROW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r".*(Punta|Llano|Valle)(?: (?:\d{1,3}(?:\.\d{3})*|\d+),\d{2}){4} ((?:\d{1,3}(?:\.\d{3})*|\d+),\d{2}).*",
    )
    .unwrap()
});

/// Tries to read a per-period consumption row from a line. Legacy
/// Punta/Llano/Valle labels normalize to P1/P2/P3.
pub(crate) fn breakdown_row(line: &str) -> Option<(PeriodLabel, f64)> {
    let (label_str, value_str) = if let Some(caps) = PX_ROW_PATTERN.captures(line) {
        (caps[1].to_string(), caps[2].to_string())
    } else if let Some(caps) = PV_ROW_PATTERN.captures(line) {
        let label = match &caps[1] {
            "Punta" => "P1",
            "Llano" => "P2",
            _ => "P3",
        };
        (label.to_string(), caps[2].to_string())
    } else {
        return None;
    };

    let label = label_str.parse::<PeriodLabel>().ok()?;
    let value = parse_spanish_number(&value_str)?;
    Some((label, value))
}
