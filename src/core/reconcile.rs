use crate::domain::model::{Bill, BillingWindow, Cups, PeriodLabel, PeriodTotals, UnifiedRecord};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;

/// Printed breakdowns that disagree with the billed energy by more than
/// this many kWh are surfaced as an issue.
const BREAKDOWN_TOLERANCE_KWH: f64 = 0.5;

/// An alternate tariff used for cost simulation: a P1..P6 price vector,
/// zero-filled for periods the tariff does not define.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternateTariff {
    pub name: String,
    pub prices: [f64; 6],
}

impl AlternateTariff {
    pub fn price(&self, period: PeriodLabel) -> f64 {
        self.prices[period.index()]
    }
}

/// Non-fatal findings collected during reconciliation. Surfaced in the run
/// summary, never silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    /// A bill arrived before its load data: emitted with empty period data.
    PartialData { cups: Cups, bill_id: String },
    /// Load totals with no matching bill are not reportable and are dropped.
    UnmatchedTotals { cups: Cups, window: BillingWindow },
    /// A simulated tariff leaves populated periods unpriced; their energy
    /// contributes nothing to the simulated cost.
    TariffMismatch {
        tariff: String,
        cups: Cups,
        bill_id: String,
        unpriced: Vec<PeriodLabel>,
    },
    /// The invoice's printed per-period breakdown does not add up to its
    /// billed energy.
    BreakdownMismatch {
        cups: Cups,
        bill_id: String,
        printed_sum: f64,
        billed: f64,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::PartialData { cups, bill_id } => write!(
                f,
                "bill '{bill_id}' for {cups} has no load totals yet; emitted without period data"
            ),
            Issue::UnmatchedTotals { cups, window } => write!(
                f,
                "load totals for {cups} over {window} have no matching bill; dropped"
            ),
            Issue::TariffMismatch {
                tariff,
                cups,
                bill_id,
                unpriced,
            } => {
                let labels: Vec<String> = unpriced.iter().map(|p| p.to_string()).collect();
                write!(
                    f,
                    "tariff '{tariff}' leaves {} unpriced for bill '{bill_id}' ({cups}); that energy is excluded from the simulated cost",
                    labels.join(", ")
                )
            }
            Issue::BreakdownMismatch {
                cups,
                bill_id,
                printed_sum,
                billed,
            } => write!(
                f,
                "bill '{bill_id}' ({cups}): printed breakdown sums to {printed_sum:.2} kWh but {billed:.2} kWh were billed"
            ),
        }
    }
}

fn simulate(
    bill: &Bill,
    energy: &BTreeMap<PeriodLabel, f64>,
    tariffs: &[AlternateTariff],
    issues: &mut Vec<Issue>,
) -> BTreeMap<String, f64> {
    let mut costs = BTreeMap::new();
    for tariff in tariffs {
        let mut cost = 0.0;
        let mut unpriced = Vec::new();
        for (&period, &kwh) in energy {
            let price = tariff.price(period);
            if price == 0.0 && kwh > 0.0 {
                unpriced.push(period);
            }
            cost += kwh * price;
        }
        if !unpriced.is_empty() {
            issues.push(Issue::TariffMismatch {
                tariff: tariff.name.clone(),
                cups: bill.cups.clone(),
                bill_id: bill.bill_id.clone(),
                unpriced,
            });
        }
        costs.insert(tariff.name.clone(), cost);
    }
    costs
}

/// Joins bills with classified load totals by (CUPS, billing window) and
/// derives the reporting metrics. Emission order follows the order of
/// `bills`; the caller is responsible for presenting bills in CUPS
/// declaration order.
pub fn merge(
    bills: &[Bill],
    totals: &[PeriodTotals],
    tariffs: &[AlternateTariff],
) -> (Vec<UnifiedRecord>, Vec<Issue>) {
    let mut by_key: HashMap<(Cups, BillingWindow), &PeriodTotals> = HashMap::new();
    for t in totals {
        by_key.insert((t.cups.clone(), t.window), t);
    }

    let mut records = Vec::with_capacity(bills.len());
    let mut issues = Vec::new();
    let mut matched: Vec<(Cups, BillingWindow)> = Vec::new();

    for bill in bills {
        let key = (bill.cups.clone(), bill.window);
        let period_energy = match by_key.get(&key) {
            Some(t) => {
                matched.push(key);
                t.totals.clone()
            }
            None => {
                warn!(
                    "no load totals for bill '{}' ({} {})",
                    bill.bill_id, bill.cups, bill.window
                );
                issues.push(Issue::PartialData {
                    cups: bill.cups.clone(),
                    bill_id: bill.bill_id.clone(),
                });
                BTreeMap::new()
            }
        };

        if let Some(billed) = bill.billed_energy_consumed {
            if !bill.energy_breakdown.is_empty() {
                let printed_sum: f64 = bill.energy_breakdown.values().sum();
                if (printed_sum - billed).abs() > BREAKDOWN_TOLERANCE_KWH {
                    issues.push(Issue::BreakdownMismatch {
                        cups: bill.cups.clone(),
                        bill_id: bill.bill_id.clone(),
                        printed_sum,
                        billed,
                    });
                }
            }
        }

        let classified: f64 = period_energy.values().sum();
        // A €0.00/kWh average would be misleading; absent means "not
        // computable", not free energy.
        let average_price = if classified > 0.0 {
            Some(bill.billed_amount_total / classified)
        } else {
            None
        };

        let simulated_costs = simulate(bill, &period_energy, tariffs, &mut issues);

        records.push(UnifiedRecord {
            cups: bill.cups.clone(),
            issuer: bill.issuer.clone(),
            bill_id: bill.bill_id.clone(),
            billing_date: bill.billing_date,
            window: bill.window,
            billed_power_capacity: bill.billed_power_capacity,
            billed_energy_consumed: bill.billed_energy_consumed,
            billed_amount_pretax: bill.billed_amount_pretax,
            billed_amount_total: bill.billed_amount_total,
            is_rectification: bill.is_rectification,
            source: bill.source.clone(),
            period_energy,
            average_price,
            simulated_costs,
        });
    }

    for key in matched {
        by_key.remove(&key);
    }
    for (cups, window) in by_key.into_keys() {
        warn!("dropping load totals for {cups} over {window}: no matching bill");
        issues.push(Issue::UnmatchedTotals { cups, window });
    }

    (records, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cups() -> Cups {
        Cups::parse("ES0021000000001234AB").unwrap()
    }

    fn window() -> BillingWindow {
        BillingWindow::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
        .unwrap()
    }

    fn bill() -> Bill {
        Bill {
            issuer: "endesa".to_string(),
            bill_id: "F-1".to_string(),
            billing_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            window: window(),
            billed_power_capacity: Some(12.34),
            billed_energy_consumed: Some(220.0),
            billed_amount_pretax: 70.0,
            billed_amount_total: 84.7,
            is_rectification: false,
            source: "f-1.txt".to_string(),
            cups: cups(),
            energy_breakdown: BTreeMap::new(),
        }
    }

    fn totals(entries: &[(PeriodLabel, f64)]) -> PeriodTotals {
        PeriodTotals {
            cups: cups(),
            window: window(),
            totals: entries.iter().copied().collect(),
        }
    }

    #[test]
    fn joined_record_carries_average_price_and_energy() {
        let t = totals(&[(PeriodLabel::P1, 120.0), (PeriodLabel::P3, 100.0)]);
        let (records, issues) = merge(&[bill()], &[t], &[]);

        assert_eq!(records.len(), 1);
        assert!(issues.is_empty());
        let r = &records[0];
        assert_eq!(r.classified_energy(), 220.0);
        let avg = r.average_price.unwrap();
        assert!((avg - 84.7 / 220.0).abs() < 1e-12);
    }

    #[test]
    fn bill_without_totals_is_emitted_with_partial_data_warning() {
        let (records, issues) = merge(&[bill()], &[], &[]);

        assert_eq!(records.len(), 1);
        assert!(records[0].period_energy.is_empty());
        assert_eq!(records[0].average_price, None);
        assert!(matches!(issues[0], Issue::PartialData { .. }));
    }

    #[test]
    fn average_price_is_absent_not_zero_without_energy() {
        let (records, _) = merge(&[bill()], &[totals(&[])], &[]);
        assert_eq!(records[0].average_price, None);
    }

    #[test]
    fn totals_without_a_bill_are_dropped_with_a_warning() {
        let t = totals(&[(PeriodLabel::P1, 50.0)]);
        let (records, issues) = merge(&[], &[t], &[]);

        assert!(records.is_empty());
        assert!(matches!(issues[0], Issue::UnmatchedTotals { .. }));
    }

    #[test]
    fn simulated_cost_sums_energy_times_price() {
        let t = totals(&[(PeriodLabel::P1, 100.0), (PeriodLabel::P3, 50.0)]);
        let tariff = AlternateTariff {
            name: "indexed".to_string(),
            prices: [0.20, 0.15, 0.10, 0.0, 0.0, 0.0],
        };
        let (records, issues) = merge(&[bill()], &[t], &[tariff]);

        assert!(issues.is_empty());
        let cost = records[0].simulated_costs["indexed"];
        assert!((cost - (100.0 * 0.20 + 50.0 * 0.10)).abs() < 1e-12);
    }

    #[test]
    fn unpriced_populated_periods_raise_tariff_mismatch() {
        let t = totals(&[(PeriodLabel::P1, 100.0), (PeriodLabel::P4, 30.0)]);
        let two_period = AlternateTariff {
            name: "flat2".to_string(),
            prices: [0.20, 0.10, 0.0, 0.0, 0.0, 0.0],
        };
        let (records, issues) = merge(&[bill()], &[t], &[two_period]);

        let cost = records[0].simulated_costs["flat2"];
        assert!((cost - 20.0).abs() < 1e-12);
        assert!(issues.iter().any(|i| matches!(
            i,
            Issue::TariffMismatch { unpriced, .. } if unpriced == &[PeriodLabel::P4]
        )));
    }

    #[test]
    fn printed_breakdown_disagreement_is_warned_not_rejected() {
        let mut b = bill();
        b.energy_breakdown.insert(PeriodLabel::P1, 100.0);
        b.energy_breakdown.insert(PeriodLabel::P2, 90.0);
        // billed_energy_consumed is 220.0; printed rows sum to 190.0.
        let (records, issues) = merge(&[b], &[totals(&[(PeriodLabel::P1, 220.0)])], &[]);

        assert_eq!(records.len(), 1);
        assert!(issues.iter().any(|i| matches!(
            i,
            Issue::BreakdownMismatch { printed_sum, billed, .. }
                if (*printed_sum - 190.0).abs() < 1e-9 && (*billed - 220.0).abs() < 1e-9
        )));
    }

    #[test]
    fn consistent_breakdown_raises_no_mismatch() {
        let mut b = bill();
        b.energy_breakdown.insert(PeriodLabel::P1, 120.0);
        b.energy_breakdown.insert(PeriodLabel::P2, 80.0);
        b.energy_breakdown.insert(PeriodLabel::P3, 20.0);
        // Rows sum to 220.0, matching billed_energy_consumed exactly.
        let (_, issues) = merge(&[b], &[totals(&[(PeriodLabel::P1, 220.0)])], &[]);
        assert!(!issues
            .iter()
            .any(|i| matches!(i, Issue::BreakdownMismatch { .. })));
    }

    #[test]
    fn emission_preserves_input_bill_order() {
        let mut b2 = bill();
        b2.bill_id = "F-2".to_string();
        b2.window = BillingWindow::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        )
        .unwrap();
        let (records, _) = merge(&[bill(), b2], &[], &[]);
        assert_eq!(records[0].bill_id, "F-1");
        assert_eq!(records[1].bill_id, "F-2");
    }
}
