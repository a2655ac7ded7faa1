pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{CsvLoadSource, CsvReportSink, DirDocumentSource};
pub use app::report_pipeline::{ReportPipeline, RunSummary};
pub use config::{CliConfig, Settings};
pub use utils::error::{BillEtlError, Result};
