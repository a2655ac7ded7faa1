use super::{breakdown_row, dmy_dates, kwh_quantity, single_amount, BillExtractor};
use crate::domain::model::{Bill, BillingWindow, Cups, PeriodLabel};
use crate::utils::error::{BillEtlError, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Endesa invoice layout. Fields are located by line markers; the invoice
/// prints the total twice (summary and detail sections), and a mismatch
/// between the two marks a rectification.
#[derive(Debug, Clone, Default)]
pub struct EndesaExtractor;

impl EndesaExtractor {
    pub fn new() -> Self {
        EndesaExtractor
    }
}

fn after_colon(line: &str) -> &str {
    line.rsplit(':').next().unwrap_or("").trim()
}

impl BillExtractor for EndesaExtractor {
    fn name(&self) -> &'static str {
        "endesa"
    }

    fn extract(&self, text: &str, source: &str) -> Result<Bill> {
        debug!("extracting Endesa bill fields from '{}'", source);

        let mut bill_id: Option<String> = None;
        let mut billing_date: Option<NaiveDate> = None;
        let mut window: Option<BillingWindow> = None;
        let mut power_capacity: Option<f64> = None;
        let mut energy_consumed: Option<f64> = None;
        let mut amount_summary: Option<f64> = None;
        let mut amount_detail: Option<f64> = None;
        let mut cups: Option<Cups> = None;
        let mut breakdown: BTreeMap<PeriodLabel, f64> = BTreeMap::new();

        for line in text.lines() {
            if line.contains("Nº factura:")
                || line.contains("Nº de factura:")
                || line.contains("Nºfactura:")
            {
                bill_id = Some(after_colon(line).to_string());
                continue;
            }
            if line.contains("Fecha emisión factura:")
                || line.contains("Fechaemisiónfactura:")
            {
                billing_date =
                    NaiveDate::parse_from_str(after_colon(line), "%d/%m/%Y").ok();
                continue;
            }
            if line.contains("Periodo de facturación:")
                || line.contains("Periododefacturación")
            {
                let dates = dmy_dates(line);
                if dates.len() == 2 {
                    window = Some(
                        BillingWindow::new(dates[0], dates[1])
                            .map_err(|_| BillEtlError::malformed(source, "billing_period"))?,
                    );
                }
                continue;
            }
            if line.starts_with("Potencia ") {
                power_capacity = single_amount(line);
                continue;
            }
            if line.starts_with("Energía ") {
                // The line carries both the kWh quantity and its price;
                // only the quantity belongs in billed_energy_consumed.
                energy_consumed = kwh_quantity(line);
                continue;
            }
            if line.starts_with("Total ") {
                amount_summary = single_amount(line);
                continue;
            }
            if line.contains("CUPS") {
                let raw = after_colon(line);
                // Drop any parenthesised qualifier after the identifier.
                let raw = raw.split('(').next().unwrap_or(raw).trim();
                cups = Cups::parse(raw).ok();
                continue;
            }
            if line.contains("TOTAL ") {
                amount_detail = single_amount(line);
                // No continue: the total and a consumption row sometimes
                // share a line.
            }
            if let Some((label, value)) = breakdown_row(line) {
                breakdown.insert(label, value);
                continue;
            }
        }

        let missing = |field: &str| BillEtlError::malformed(source, field);

        let bill_id = bill_id.filter(|s| !s.is_empty()).ok_or_else(|| missing("bill_id"))?;
        let billing_date = billing_date.ok_or_else(|| missing("billing_date"))?;
        let window = window.ok_or_else(|| missing("billing_period"))?;
        let cups = cups.ok_or_else(|| missing("cups"))?;
        let amount_summary = amount_summary.ok_or_else(|| missing("billed_amount_pretax"))?;
        let amount_detail = amount_detail.ok_or_else(|| missing("billed_amount_total"))?;

        // Two different totals on the same invoice mean a correction was
        // applied; a negative total is a credit note.
        let is_rectification =
            (amount_detail - amount_summary).abs() > 1e-9 || amount_detail < 0.0;

        let bill = Bill {
            issuer: self.name().to_string(),
            bill_id,
            billing_date,
            window,
            billed_power_capacity: power_capacity,
            billed_energy_consumed: energy_consumed,
            billed_amount_pretax: amount_summary,
            billed_amount_total: amount_detail,
            is_rectification,
            source: source.to_string(),
            cups,
            energy_breakdown: breakdown,
        };
        bill.validate()?;
        Ok(bill)
    }
}
