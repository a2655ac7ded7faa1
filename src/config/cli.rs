use clap::Parser;
use std::path::PathBuf;

/// Extract bill information from utility invoices, classify hourly meter
/// readings into tariff periods and emit a unified CSV report.
#[derive(Parser, Debug, Clone)]
#[command(name = "bill-etl", version)]
pub struct CliConfig {
    /// Settings file (dispatchers, tariff plans, supplies).
    #[arg(long, default_value = "bill-etl.toml")]
    pub config: PathBuf,

    /// Directory scanned recursively for bill documents (.txt).
    #[arg(long)]
    pub documents: PathBuf,

    /// CSV file with hourly meter readings (cups, timestamp, kwh).
    #[arg(long)]
    pub loads: PathBuf,

    /// Where to write the report.
    #[arg(long, default_value = "report.csv")]
    pub output: PathBuf,

    /// Process at most this many documents (0 = no limit).
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Verbose (debug) logging.
    #[arg(long)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,
}
