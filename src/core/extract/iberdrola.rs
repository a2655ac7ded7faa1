use super::{breakdown_row, kwh_quantity, single_amount, BillExtractor};
use crate::domain::model::{Bill, BillingWindow, Cups, PeriodLabel};
use crate::utils::error::{BillEtlError, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static DOTTED_DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}\.\d{2}\.\d{4}").unwrap());

fn dotted_dates(line: &str) -> Vec<NaiveDate> {
    DOTTED_DATE_PATTERN
        .find_iter(line)
        .filter_map(|m| NaiveDate::parse_from_str(m.as_str(), "%d.%m.%Y").ok())
        .collect()
}

/// Iberdrola invoice layout: dotted dd.mm.yyyy dates, the billing window on
/// a "del ... al ..." line, and rectifications flagged with an explicit
/// marker token instead of a repeated total.
#[derive(Debug, Clone, Default)]
pub struct IberdrolaExtractor;

impl IberdrolaExtractor {
    pub fn new() -> Self {
        IberdrolaExtractor
    }
}

impl BillExtractor for IberdrolaExtractor {
    fn name(&self) -> &'static str {
        "iberdrola"
    }

    fn extract(&self, text: &str, source: &str) -> Result<Bill> {
        debug!("extracting Iberdrola bill fields from '{}'", source);

        let mut bill_id: Option<String> = None;
        let mut billing_date: Option<NaiveDate> = None;
        let mut window: Option<BillingWindow> = None;
        let mut power_capacity: Option<f64> = None;
        let mut energy_consumed: Option<f64> = None;
        let mut amount_pretax: Option<f64> = None;
        let mut amount_total: Option<f64> = None;
        let mut cups: Option<Cups> = None;
        let mut marked_rectification = false;
        let mut breakdown: BTreeMap<PeriodLabel, f64> = BTreeMap::new();

        for line in text.lines() {
            if line.contains("FACTURA RECTIFICATIVA") {
                marked_rectification = true;
                continue;
            }
            if let Some(rest) = line.strip_prefix("Número de factura:") {
                bill_id = Some(rest.trim().to_string());
                continue;
            }
            if line.starts_with("Fecha de la factura:") {
                billing_date = dotted_dates(line).first().copied();
                continue;
            }
            if line.starts_with("Periodo de consumo:") {
                let dates = dotted_dates(line);
                if dates.len() == 2 {
                    window = Some(
                        BillingWindow::new(dates[0], dates[1])
                            .map_err(|_| BillEtlError::malformed(source, "billing_period"))?,
                    );
                }
                continue;
            }
            if line.starts_with("Potencia facturada") {
                power_capacity = single_amount(line);
                continue;
            }
            if line.starts_with("Energía consumida") {
                energy_consumed = kwh_quantity(line);
                continue;
            }
            if line.starts_with("Base imponible") {
                amount_pretax = single_amount(line);
                continue;
            }
            if line.starts_with("TOTAL IMPORTE FACTURA") {
                amount_total = single_amount(line);
                continue;
            }
            if line.contains("CUPS") {
                let raw = line.rsplit(':').next().unwrap_or("").trim();
                cups = Cups::parse(raw).ok();
                continue;
            }
            if let Some((label, value)) = breakdown_row(line) {
                breakdown.insert(label, value);
            }
        }

        let missing = |field: &str| BillEtlError::malformed(source, field);

        let bill_id = bill_id.filter(|s| !s.is_empty()).ok_or_else(|| missing("bill_id"))?;
        let billing_date = billing_date.ok_or_else(|| missing("billing_date"))?;
        let window = window.ok_or_else(|| missing("billing_period"))?;
        let cups = cups.ok_or_else(|| missing("cups"))?;
        let amount_pretax = amount_pretax.ok_or_else(|| missing("billed_amount_pretax"))?;
        let amount_total = amount_total.ok_or_else(|| missing("billed_amount_total"))?;

        let is_rectification = marked_rectification || amount_total < 0.0;

        let bill = Bill {
            issuer: self.name().to_string(),
            bill_id,
            billing_date,
            window,
            billed_power_capacity: power_capacity,
            billed_energy_consumed: energy_consumed,
            billed_amount_pretax: amount_pretax,
            billed_amount_total: amount_total,
            is_rectification,
            source: source.to_string(),
            cups,
            energy_breakdown: breakdown,
        };
        bill.validate()?;
        Ok(bill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "\
IBERDROLA CLIENTES S.A.U.
Número de factura: 24/0098765
Fecha de la factura: 02.03.2024
Periodo de consumo: del 01.02.2024 al 01.03.2024
Potencia facturada 4,60 kW 11,50 €
Energía consumida 310,00 kWh
Base imponible 62,15 €
TOTAL IMPORTE FACTURA 75,20 €
CUPS: ES0021000000009876CD
P1 1.18.1 1,00 2,00 1,00 0,00 160,00
P2 1.18.2 1,00 2,00 1,00 0,00 100,00
P3 1.18.3 1,00 2,00 1,00 0,00 50,00
";

    #[test]
    fn parses_a_complete_invoice() {
        let bill = IberdrolaExtractor::new()
            .extract(FIXTURE, "24-0098765.txt")
            .unwrap();

        assert_eq!(bill.issuer, "iberdrola");
        assert_eq!(bill.bill_id, "24/0098765");
        assert_eq!(
            bill.billing_date,
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
        assert_eq!(
            bill.window.start,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        assert_eq!(bill.billed_energy_consumed, Some(310.0));
        assert_eq!(bill.billed_amount_pretax, 62.15);
        assert_eq!(bill.billed_amount_total, 75.20);
        assert!(!bill.is_rectification);
        assert_eq!(bill.cups.as_str(), "ES0021000000009876CD");
        assert_eq!(bill.energy_breakdown[&PeriodLabel::P1], 160.0);
        assert_eq!(bill.energy_breakdown[&PeriodLabel::P3], 50.0);
    }

    #[test]
    fn marker_token_flags_a_rectification() {
        let text = format!("FACTURA RECTIFICATIVA\n{FIXTURE}");
        let bill = IberdrolaExtractor::new().extract(&text, "r.txt").unwrap();
        assert!(bill.is_rectification);
    }

    #[test]
    fn negative_total_is_accepted_and_flags_a_rectification() {
        let text = FIXTURE
            .replace("Base imponible 62,15 €", "Base imponible -37,40 €")
            .replace(
                "TOTAL IMPORTE FACTURA 75,20 €",
                "TOTAL IMPORTE FACTURA -45,20 €",
            );
        let bill = IberdrolaExtractor::new().extract(&text, "c.txt").unwrap();
        assert_eq!(bill.billed_amount_total, -45.20);
        assert!(bill.is_rectification);
    }

    #[test]
    fn missing_window_names_the_field() {
        let text = FIXTURE.replace("Periodo de consumo: del 01.02.2024 al 01.03.2024", "");
        let err = IberdrolaExtractor::new()
            .extract(&text, "b.txt")
            .unwrap_err();
        assert!(matches!(
            err,
            BillEtlError::MalformedBill { ref field, .. } if field == "billing_period"
        ));
    }
}
