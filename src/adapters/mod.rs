// Adapters: filesystem and CSV implementations of the core's collaborator
// ports. All I/O lives here; the core stays purely computational.

use crate::domain::model::{Cups, LoadSample, UnifiedRecord};
use crate::domain::ports::{DocumentSource, LoadSource, RawDocument, ReportSink};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Recursively enumerates `.txt` bill documents under a directory, in
/// sorted path order.
#[derive(Debug, Clone)]
pub struct DirDocumentSource {
    dir: PathBuf,
    limit: usize,
}

impl DirDocumentSource {
    /// `limit` of 0 means no limit.
    pub fn new(dir: impl Into<PathBuf>, limit: usize) -> Self {
        DirDocumentSource {
            dir: dir.into(),
            limit,
        }
    }

    fn collect_paths(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::collect_paths(&path, out)?;
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
            {
                out.push(path);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentSource for DirDocumentSource {
    async fn documents(&self) -> Result<Vec<RawDocument>> {
        let mut paths = Vec::new();
        Self::collect_paths(&self.dir, &mut paths)?;
        paths.sort();

        if self.limit > 0 && paths.len() > self.limit {
            warn!("limiting to {} of {} documents", self.limit, paths.len());
            paths.truncate(self.limit);
        }

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let text = tokio::fs::read_to_string(&path).await?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            documents.push(RawDocument { name, text });
        }
        Ok(documents)
    }
}

#[derive(Debug, Deserialize)]
struct RawReading {
    cups: String,
    timestamp: String,
    kwh: f64,
}

/// Hourly meter readings from a CSV file with columns cups, timestamp
/// ("%Y-%m-%d %H:%M") and kwh. Rows that fail to parse, and rows with
/// negative energy, are skipped with a warning rather than failing the run.
#[derive(Debug, Clone)]
pub struct CsvLoadSource {
    path: PathBuf,
}

impl CsvLoadSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvLoadSource { path: path.into() }
    }
}

#[async_trait]
impl LoadSource for CsvLoadSource {
    async fn samples(&self, cups: &Cups) -> Result<Vec<LoadSample>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut samples = Vec::new();
        for result in reader.deserialize() {
            let raw: RawReading = match result {
                Ok(r) => r,
                Err(e) => {
                    warn!("skipping invalid reading row: {e}");
                    continue;
                }
            };
            if raw.cups != cups.as_str() {
                continue;
            }
            let timestamp =
                match NaiveDateTime::parse_from_str(&raw.timestamp, "%Y-%m-%d %H:%M") {
                    Ok(ts) => ts,
                    Err(e) => {
                        warn!("skipping invalid timestamp '{}': {e}", raw.timestamp);
                        continue;
                    }
                };
            if raw.kwh < 0.0 {
                warn!(
                    "skipping negative reading for {} at {}: {}",
                    cups, timestamp, raw.kwh
                );
                continue;
            }
            samples.push(LoadSample {
                cups: cups.clone(),
                timestamp,
                kwh: raw.kwh,
            });
        }
        Ok(samples)
    }
}

/// Writes the unified records as one CSV file. Absent metrics render as
/// empty cells, never as 0.0.
#[derive(Debug, Clone)]
pub struct CsvReportSink {
    path: PathBuf,
    tariff_names: Vec<String>,
}

impl CsvReportSink {
    pub fn new(path: impl Into<PathBuf>, tariff_names: Vec<String>) -> Self {
        CsvReportSink {
            path: path.into(),
            tariff_names,
        }
    }

    fn opt_cell(value: Option<f64>) -> String {
        value.map(|v| format!("{v:.4}")).unwrap_or_default()
    }
}

#[async_trait]
impl ReportSink for CsvReportSink {
    async fn emit(&self, records: &[UnifiedRecord]) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)?;

        let mut header = vec![
            "cups".to_string(),
            "issuer".to_string(),
            "bill_id".to_string(),
            "billing_date".to_string(),
            "period_start".to_string(),
            "period_end".to_string(),
            "billed_power_capacity".to_string(),
            "billed_energy_consumed".to_string(),
            "billed_amount_pretax".to_string(),
            "billed_amount_total".to_string(),
            "is_rectification".to_string(),
        ];
        for period in crate::domain::model::PeriodLabel::ALL {
            header.push(period.to_string());
        }
        header.push("classified_energy".to_string());
        header.push("average_price".to_string());
        for tariff in &self.tariff_names {
            header.push(format!("simulated_{tariff}"));
        }
        header.push("source".to_string());
        writer.write_record(&header)?;

        for record in records {
            let mut row = vec![
                record.cups.to_string(),
                record.issuer.clone(),
                record.bill_id.clone(),
                record.billing_date.to_string(),
                record.window.start.to_string(),
                record.window.end.to_string(),
                Self::opt_cell(record.billed_power_capacity),
                Self::opt_cell(record.billed_energy_consumed),
                format!("{:.2}", record.billed_amount_pretax),
                format!("{:.2}", record.billed_amount_total),
                record.is_rectification.to_string(),
            ];
            for period in crate::domain::model::PeriodLabel::ALL {
                row.push(Self::opt_cell(record.period_energy.get(&period).copied()));
            }
            let classified = record.classified_energy();
            row.push(if record.period_energy.is_empty() {
                String::new()
            } else {
                format!("{classified:.4}")
            });
            row.push(Self::opt_cell(record.average_price));
            for tariff in &self.tariff_names {
                row.push(Self::opt_cell(record.simulated_costs.get(tariff).copied()));
            }
            row.push(record.source.clone());
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }
}
