use crate::domain::model::{Cups, LoadSample, UnifiedRecord};
use crate::utils::error::Result;
use async_trait::async_trait;

/// A bill document as handed to the core: file name plus extractable text.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub name: String,
    pub text: String,
}

/// Finite, enumerable source of bill documents. Whether that is a local
/// directory or a remote store is opaque to the core.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn documents(&self) -> Result<Vec<RawDocument>>;
}

/// Source of hourly meter readings per CUPS. Returned samples need not be
/// ordered; the classifier sorts before accumulating.
#[async_trait]
pub trait LoadSource: Send + Sync {
    async fn samples(&self, cups: &Cups) -> Result<Vec<LoadSample>>;
}

/// Receives the ordered sequence of unified records for rendering.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn emit(&self, records: &[UnifiedRecord]) -> Result<()>;
}
