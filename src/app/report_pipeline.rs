use crate::config::settings::Settings;
use crate::core::calendar::TariffPlan;
use crate::core::classifier::{classify, WindowPolicy};
use crate::core::dispatch::Dispatcher;
use crate::core::reconcile::{merge, AlternateTariff, Issue};
use crate::domain::model::{Bill, Cups, PeriodTotals};
use crate::domain::ports::{DocumentSource, LoadSource, ReportSink};
use crate::utils::error::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A document that could not be turned into a Bill, with the reason it was
/// set aside.
#[derive(Debug, Clone)]
pub struct SkippedDocument {
    pub name: String,
    pub reason: String,
}

/// Outcome of one run: emitted record count plus every non-fatal finding,
/// so nothing is silently dropped.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub documents_seen: usize,
    pub emitted: usize,
    pub skipped: Vec<SkippedDocument>,
    pub issues: Vec<Issue>,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            "processed {} documents: {} records emitted, {} skipped, {} warnings",
            self.documents_seen,
            self.emitted,
            self.skipped.len(),
            self.issues.len()
        );
        for skipped in &self.skipped {
            warn!("skipped '{}': {}", skipped.name, skipped.reason);
        }
        for issue in &self.issues {
            warn!("{issue}");
        }
    }
}

/// End-to-end run: enumerate documents, dispatch and extract bills,
/// classify load samples per supply, reconcile, emit.
///
/// Per-document failures (unknown issuer, malformed bill) are isolated;
/// configuration problems (including ambiguous seasons) fail construction
/// before any document is read.
pub struct ReportPipeline<D: DocumentSource, L: LoadSource, S: ReportSink> {
    documents: D,
    loads: L,
    sink: S,
    dispatcher: Dispatcher,
    plans: BTreeMap<String, Arc<TariffPlan>>,
    tariffs: Vec<AlternateTariff>,
    supplies: Vec<(Cups, String)>,
    policy: WindowPolicy,
}

impl<D: DocumentSource, L: LoadSource, S: ReportSink> ReportPipeline<D, L, S> {
    pub fn new(settings: &Settings, documents: D, loads: L, sink: S) -> Result<Self> {
        let dispatcher = Dispatcher::from_config(&settings.dispatchers)?;
        let plans = settings.build_plans()?;
        let tariffs = settings.alternate_tariffs()?;
        let supplies = settings.supply_points()?;
        Ok(ReportPipeline {
            documents,
            loads,
            sink,
            dispatcher,
            plans,
            tariffs,
            supplies,
            policy: settings.window_policy(),
        })
    }

    /// Extract stage: one Bill per parseable document, grouped by CUPS.
    /// Bad documents are recorded in the summary and do not abort the run.
    async fn extract_bills(
        &self,
        summary: &mut RunSummary,
    ) -> Result<BTreeMap<Cups, Vec<Bill>>> {
        let documents = self.documents.documents().await?;
        summary.documents_seen = documents.len();
        info!("found {} documents", documents.len());

        let mut bills: BTreeMap<Cups, Vec<Bill>> = BTreeMap::new();
        for document in documents {
            let Some(issuer) = self.dispatcher.identify(&document.text) else {
                warn!("'{}': no configured issuer identity found", document.name);
                summary.skipped.push(SkippedDocument {
                    name: document.name,
                    reason: "no configured issuer identity found in document".to_string(),
                });
                continue;
            };

            let result = self
                .dispatcher
                .dispatch(issuer)
                .and_then(|extractor| extractor.extract(&document.text, &document.name));
            match result {
                Ok(bill) => {
                    debug!(
                        "extracted bill '{}' for {} from '{}'",
                        bill.bill_id, bill.cups, document.name
                    );
                    bills.entry(bill.cups.clone()).or_default().push(bill);
                }
                Err(e) if e.is_document_scoped() => {
                    warn!("'{}': {e}", document.name);
                    summary.skipped.push(SkippedDocument {
                        name: document.name,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(bills)
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut bills_by_cups = self.extract_bills(&mut summary).await?;

        // Classify and order per the supplies declaration; bills for
        // unlisted CUPS have no plan and no report position.
        let mut ordered_bills: Vec<Bill> = Vec::new();
        let mut totals: Vec<PeriodTotals> = Vec::new();
        for (cups, plan_name) in &self.supplies {
            let mut bills = bills_by_cups.remove(cups).unwrap_or_default();
            bills.sort_by(|a, b| {
                (a.window.start, &a.bill_id).cmp(&(b.window.start, &b.bill_id))
            });

            let plan = &self.plans[plan_name];
            let samples = self.loads.samples(cups).await?;
            debug!("{}: {} load samples on plan {}", cups, samples.len(), plan_name);

            for bill in &bills {
                let period_totals =
                    classify(cups, &samples, plan, bill.window, self.policy);
                // An empty map means no readings fell in the window; leave
                // the join side absent so the partial-data path reports it.
                if !period_totals.totals.is_empty() {
                    totals.push(period_totals);
                }
            }
            ordered_bills.extend(bills);
        }

        for (cups, bills) in bills_by_cups {
            for bill in bills {
                warn!(
                    "bill '{}' for {} has no supply entry; skipped",
                    bill.bill_id, cups
                );
                summary.skipped.push(SkippedDocument {
                    name: bill.source,
                    reason: format!("no supply configured for {cups}"),
                });
            }
        }

        let (records, issues) = merge(&ordered_bills, &totals, &self.tariffs);
        summary.issues = issues;
        summary.emitted = records.len();

        self.sink.emit(&records).await?;
        summary.log();
        Ok(summary)
    }
}
