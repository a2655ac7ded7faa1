use crate::core::calendar::{Season, TariffPlan};
use crate::core::classifier::WindowPolicy;
use crate::core::reconcile::AlternateTariff;
use crate::domain::model::{Cups, PeriodLabel};
use crate::utils::error::{BillEtlError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_non_negative, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Issuer identity string (tax id or free-text name) -> extractor name.
    pub dispatchers: BTreeMap<String, String>,
    /// Tariff plan name -> calendar definition.
    pub loads: BTreeMap<String, PlanConfig>,
    /// Alternate tariff name -> P1..P6 price vector (zero-filled for
    /// undefined periods; shorter vectors are padded with zeros).
    #[serde(default)]
    pub tariffs: BTreeMap<String, Vec<f64>>,
    /// Metering points to report on, in emission order.
    #[serde(default)]
    pub supplies: Vec<SupplyConfig>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Period applied to every hour of months no season covers.
    pub default: String,
    #[serde(default)]
    pub seasons: BTreeMap<String, SeasonConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub months: Vec<u32>,
    /// Hour slot ("1".."24") -> period label.
    pub hours: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyConfig {
    pub cups: String,
    pub plan: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Whether the billing window's end date contributes hours. Defaults to
    /// false ([start, end)); verify against real invoice arithmetic before
    /// flipping.
    #[serde(default)]
    pub include_end_date: bool,
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BillEtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BillEtlError::ConfigError {
            message: format!("TOML parsing error: {e}"),
        })
    }

    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy {
            include_end_date: self.classifier.include_end_date,
        }
    }

    /// Builds the immutable plan arena. Overlapping season month sets
    /// surface here as `AmbiguousSeason`, before any classification runs.
    pub fn build_plans(&self) -> Result<BTreeMap<String, Arc<TariffPlan>>> {
        let mut plans = BTreeMap::new();
        for (plan_name, plan_config) in &self.loads {
            let default = plan_config.default.parse::<PeriodLabel>()?;

            let mut seasons = Vec::new();
            for (season_name, season_config) in &plan_config.seasons {
                let mut hour_table = BTreeMap::new();
                for (hour_key, label) in &season_config.hours {
                    let hour: u32 =
                        hour_key.parse().map_err(|_| BillEtlError::InvalidValueError {
                            field: format!("loads.{plan_name}.seasons.{season_name}.hours"),
                            value: hour_key.clone(),
                            reason: "hour keys must be integers 1..24".to_string(),
                        })?;
                    hour_table.insert(hour, label.parse::<PeriodLabel>()?);
                }
                seasons.push(Season::new(season_name, &season_config.months, &hour_table)?);
            }

            let plan = TariffPlan::new(plan_name, default, seasons)?;
            plans.insert(plan_name.clone(), Arc::new(plan));
        }
        Ok(plans)
    }

    /// Alternate tariffs for cost simulation, padded to six prices.
    pub fn alternate_tariffs(&self) -> Result<Vec<AlternateTariff>> {
        let mut tariffs = Vec::new();
        for (name, prices) in &self.tariffs {
            if prices.len() > 6 {
                return Err(BillEtlError::InvalidValueError {
                    field: format!("tariffs.{name}"),
                    value: format!("{} prices", prices.len()),
                    reason: "a tariff defines at most six period prices".to_string(),
                });
            }
            let mut vector = [0.0; 6];
            for (i, &price) in prices.iter().enumerate() {
                validate_non_negative(&format!("tariffs.{name}[{i}]"), price)?;
                vector[i] = price;
            }
            tariffs.push(AlternateTariff {
                name: name.clone(),
                prices: vector,
            });
        }
        Ok(tariffs)
    }

    /// Supplies in declaration order with their CUPS parsed.
    pub fn supply_points(&self) -> Result<Vec<(Cups, String)>> {
        let mut points = Vec::new();
        for (i, supply) in self.supplies.iter().enumerate() {
            let cups = Cups::parse(&supply.cups)?;
            if !self.loads.contains_key(&supply.plan) {
                return Err(BillEtlError::InvalidValueError {
                    field: format!("supplies[{i}].plan"),
                    value: supply.plan.clone(),
                    reason: "plan is not defined under [loads]".to_string(),
                });
            }
            points.push((cups, supply.plan.clone()));
        }
        Ok(points)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        if self.dispatchers.is_empty() {
            return Err(BillEtlError::config(
                "dispatchers: at least one issuer mapping is required",
            ));
        }
        for (identity, extractor) in &self.dispatchers {
            validate_non_empty_string("dispatchers key", identity)?;
            validate_non_empty_string(&format!("dispatchers.'{identity}'"), extractor)?;
        }

        // Plan construction performs the structural checks (hour coverage,
        // month ranges, disjoint seasons).
        self.build_plans()?;
        self.alternate_tariffs()?;
        self.supply_points()?;
        Ok(())
    }
}
