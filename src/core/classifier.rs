use crate::core::calendar::TariffPlan;
use crate::domain::model::{BillingWindow, Cups, LoadSample, PeriodTotals};
use chrono::{Datelike, Timelike};
use std::collections::BTreeMap;

/// Window-boundary policy for classification. The default excludes the end
/// date's hours (`[start, end)`, matching billing_period_start/end
/// semantics); real invoice arithmetic should be checked before flipping
/// `include_end_date`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowPolicy {
    pub include_end_date: bool,
}

/// Calendar hour slot (1..24) for a timestamp; hour 24 is 23:00-24:00.
fn hour_slot(sample: &LoadSample) -> u32 {
    sample.timestamp.hour() + 1
}

/// Aggregates one CUPS's hourly samples into per-period totals for a
/// billing window.
///
/// Samples outside the window are ignored. Missing hours inside the window
/// are tolerated: meter feeds are not guaranteed gap-free, so only what
/// exists is summed. Accumulation runs in ascending timestamp order, making
/// the totals reproducible bit-for-bit on identical input.
pub fn classify(
    cups: &Cups,
    samples: &[LoadSample],
    plan: &TariffPlan,
    window: BillingWindow,
    policy: WindowPolicy,
) -> PeriodTotals {
    let mut in_window: Vec<&LoadSample> = samples
        .iter()
        .filter(|s| window.contains(s.timestamp.date(), policy.include_end_date))
        .collect();
    in_window.sort_by_key(|s| s.timestamp);

    let mut totals: BTreeMap<_, f64> = BTreeMap::new();
    for sample in in_window {
        let label = plan.period_for(sample.timestamp.date().month(), hour_slot(sample));
        *totals.entry(label).or_insert(0.0) += sample.kwh;
    }

    PeriodTotals {
        cups: cups.clone(),
        window,
        totals,
    }
}
