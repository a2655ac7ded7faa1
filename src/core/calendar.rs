use crate::domain::model::PeriodLabel;
use crate::utils::error::{BillEtlError, Result};
use crate::utils::validation::{validate_hour, validate_month};
use std::collections::{BTreeMap, BTreeSet};

/// A named sub-range of months within a tariff plan carrying its own
/// hour-to-period table. Hours are keyed 1..24, where hour 24 is the last
/// hour of the day (23:00-24:00).
#[derive(Debug, Clone)]
pub struct Season {
    name: String,
    months: BTreeSet<u32>,
    hours: [PeriodLabel; 24],
}

impl Season {
    pub fn new(
        name: &str,
        months: &[u32],
        hour_table: &BTreeMap<u32, PeriodLabel>,
    ) -> Result<Self> {
        if months.is_empty() {
            return Err(BillEtlError::InvalidValueError {
                field: format!("season '{}'.months", name),
                value: "[]".to_string(),
                reason: "a season must cover at least one month".to_string(),
            });
        }
        let mut month_set = BTreeSet::new();
        for &month in months {
            validate_month(&format!("season '{}'.months", name), month)?;
            month_set.insert(month);
        }

        let mut hours = [PeriodLabel::P1; 24];
        for hour in 1..=24u32 {
            let label = hour_table.get(&hour).copied().ok_or_else(|| {
                BillEtlError::InvalidValueError {
                    field: format!("season '{}'.hours", name),
                    value: hour.to_string(),
                    reason: "hour table must cover every hour 1..24".to_string(),
                }
            })?;
            hours[(hour - 1) as usize] = label;
        }
        for &hour in hour_table.keys() {
            validate_hour(&format!("season '{}'.hours", name), hour)?;
        }

        Ok(Season {
            name: name.to_string(),
            months: month_set,
            hours,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn covers_month(&self, month: u32) -> bool {
        self.months.contains(&month)
    }
}

/// Immutable tariff plan: up to six periods, a default period and zero or
/// more seasons with disjoint month sets. Loaded once from configuration
/// and shared read-only.
#[derive(Debug, Clone)]
pub struct TariffPlan {
    name: String,
    default: PeriodLabel,
    seasons: Vec<Season>,
    periods: BTreeSet<PeriodLabel>,
}

impl TariffPlan {
    /// Builds the plan, rejecting overlapping season month sets up front so
    /// an ambiguous configuration can never silently mis-bill.
    pub fn new(name: &str, default: PeriodLabel, seasons: Vec<Season>) -> Result<Self> {
        let mut claimed: BTreeMap<u32, &str> = BTreeMap::new();
        for season in &seasons {
            for &month in &season.months {
                if let Some(first) = claimed.get(&month) {
                    return Err(BillEtlError::AmbiguousSeason {
                        plan: name.to_string(),
                        month,
                        first: first.to_string(),
                        second: season.name.clone(),
                    });
                }
                claimed.insert(month, season.name.as_str());
            }
        }

        let mut periods = BTreeSet::new();
        periods.insert(default);
        for season in &seasons {
            periods.extend(season.hours.iter().copied());
        }

        Ok(TariffPlan {
            name: name.to_string(),
            default,
            seasons,
            periods,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_period(&self) -> PeriodLabel {
        self.default
    }

    /// Periods the plan actually defines. Plans with fewer than six periods
    /// simply never produce the missing labels.
    pub fn periods(&self) -> &BTreeSet<PeriodLabel> {
        &self.periods
    }

    /// Resolves the tariff period for a (month, hour) pair. The first
    /// season covering `month` wins; with no covering season every hour of
    /// the day falls in the plan's default period. Total over month 1..12
    /// and hour 1..24; out-of-range input is a caller bug.
    pub fn period_for(&self, month: u32, hour: u32) -> PeriodLabel {
        debug_assert!((1..=12).contains(&month), "month out of range: {month}");
        debug_assert!((1..=24).contains(&hour), "hour out of range: {hour}");
        let season = self.seasons.iter().find(|s| s.covers_month(month));
        match season {
            Some(season) => {
                let idx = hour.clamp(1, 24) as usize - 1;
                season.hours[idx]
            }
            None => self.default,
        }
    }
}
