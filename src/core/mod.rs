pub mod calendar;
pub mod classifier;
pub mod dispatch;
pub mod extract;
pub mod reconcile;

pub use crate::domain::model::{
    Bill, BillingWindow, Cups, LoadSample, PeriodLabel, PeriodTotals, UnifiedRecord,
};
pub use crate::domain::ports::{DocumentSource, LoadSource, RawDocument, ReportSink};
pub use crate::utils::error::Result;
