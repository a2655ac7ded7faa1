use crate::utils::error::{BillEtlError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Tariff period label, P1 most expensive through P6 cheapest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PeriodLabel {
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
}

impl PeriodLabel {
    pub const ALL: [PeriodLabel; 6] = [
        PeriodLabel::P1,
        PeriodLabel::P2,
        PeriodLabel::P3,
        PeriodLabel::P4,
        PeriodLabel::P5,
        PeriodLabel::P6,
    ];

    /// Zero-based position in a P1..P6 price vector.
    pub fn index(&self) -> usize {
        match self {
            PeriodLabel::P1 => 0,
            PeriodLabel::P2 => 1,
            PeriodLabel::P3 => 2,
            PeriodLabel::P4 => 3,
            PeriodLabel::P5 => 4,
            PeriodLabel::P6 => 5,
        }
    }
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.index() + 1)
    }
}

impl FromStr for PeriodLabel {
    type Err = BillEtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "P1" => Ok(PeriodLabel::P1),
            "P2" => Ok(PeriodLabel::P2),
            "P3" => Ok(PeriodLabel::P3),
            "P4" => Ok(PeriodLabel::P4),
            "P5" => Ok(PeriodLabel::P5),
            "P6" => Ok(PeriodLabel::P6),
            other => Err(BillEtlError::InvalidValueError {
                field: "period".to_string(),
                value: other.to_string(),
                reason: "expected one of P1..P6".to_string(),
            }),
        }
    }
}

// ES + 16 digits + 2 check letters, optionally followed by the 2-character
// border-point suffix (digit + letter).
static CUPS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ES[0-9]{16}[A-Z]{2}([0-9][A-Z])?$").unwrap());

/// Metering/supply point identifier (Código Universal del Punto de
/// Suministro). 20 or 22 characters, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cups(String);

impl Cups {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if CUPS_PATTERN.is_match(trimmed) {
            Ok(Cups(trimmed.to_string()))
        } else {
            Err(BillEtlError::InvalidValueError {
                field: "cups".to_string(),
                value: raw.to_string(),
                reason: "expected ES + 16 digits + 2 letters (+ optional 2-char suffix)"
                    .to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One billing period. `start <= end` is enforced at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BillingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(BillEtlError::InvalidValueError {
                field: "billing_period".to_string(),
                value: format!("{} - {}", start, end),
                reason: "billing_period_start must not be after billing_period_end"
                    .to_string(),
            });
        }
        Ok(BillingWindow { start, end })
    }

    /// Whether a date falls in the window. The start date is always
    /// included; the end date only when `include_end` is set.
    pub fn contains(&self, date: NaiveDate, include_end: bool) -> bool {
        if include_end {
            date >= self.start && date <= self.end
        } else {
            date >= self.start && date < self.end
        }
    }
}

impl fmt::Display for BillingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Normalized invoice record. Built exclusively by a bill extractor and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub issuer: String,
    pub bill_id: String,
    pub billing_date: NaiveDate,
    pub window: BillingWindow,
    /// Billed amount for the power term, when the invoice prints one.
    pub billed_power_capacity: Option<f64>,
    /// Total invoiced energy in kWh, when the invoice prints one.
    pub billed_energy_consumed: Option<f64>,
    pub billed_amount_pretax: f64,
    pub billed_amount_total: f64,
    pub is_rectification: bool,
    /// File name of the source document.
    pub source: String,
    pub cups: Cups,
    /// Per-period energy breakdown as printed on the invoice, when present.
    /// Legacy Punta/Llano/Valle rows are normalized to P1/P2/P3.
    pub energy_breakdown: BTreeMap<PeriodLabel, f64>,
}

impl Bill {
    /// Structural sanity check. Rectification and credit bills carry
    /// negative amounts and are always accepted; the pretax/total ordering
    /// is only meaningful on regular charges.
    pub fn validate(&self) -> Result<()> {
        if !self.is_rectification
            && self.billed_amount_pretax >= 0.0
            && self.billed_amount_total >= 0.0
            && self.billed_amount_total + 1e-9 < self.billed_amount_pretax
        {
            return Err(BillEtlError::malformed(&self.source, "billed_amount_total"));
        }
        Ok(())
    }
}

/// One hourly meter reading for one CUPS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSample {
    pub cups: Cups,
    /// Hour-resolution timestamp marking the start of the metered hour.
    pub timestamp: NaiveDateTime,
    pub kwh: f64,
}

/// Aggregated energy per tariff period for one CUPS and billing window.
/// Built exclusively by the load classifier. Periods the plan does not
/// define are absent, never synthesized as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub cups: Cups,
    pub window: BillingWindow,
    pub totals: BTreeMap<PeriodLabel, f64>,
}

impl PeriodTotals {
    pub fn total_energy(&self) -> f64 {
        self.totals.values().sum()
    }
}

/// Join of a Bill with its classified load totals plus derived metrics.
/// Built exclusively by reconciliation; handed to the reporting layer as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedRecord {
    pub cups: Cups,
    pub issuer: String,
    pub bill_id: String,
    pub billing_date: NaiveDate,
    pub window: BillingWindow,
    pub billed_power_capacity: Option<f64>,
    pub billed_energy_consumed: Option<f64>,
    pub billed_amount_pretax: f64,
    pub billed_amount_total: f64,
    pub is_rectification: bool,
    pub source: String,
    /// Classified energy per period; empty when load data was unavailable.
    pub period_energy: BTreeMap<PeriodLabel, f64>,
    /// billed_amount_total / classified energy, absent when no energy was
    /// classified (never reported as 0.0).
    pub average_price: Option<f64>,
    /// Simulated cost under each configured alternate tariff.
    pub simulated_costs: BTreeMap<String, f64>,
}

impl UnifiedRecord {
    pub fn classified_energy(&self) -> f64 {
        self.period_energy.values().sum()
    }
}
