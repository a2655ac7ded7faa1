use anyhow::Result;
use async_trait::async_trait;
use bill_etl::domain::model::{PeriodLabel, UnifiedRecord};
use bill_etl::domain::ports::ReportSink;
use bill_etl::utils::validation::Validate;
use bill_etl::{CsvLoadSource, CsvReportSink, DirDocumentSource, ReportPipeline, Settings};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const CUPS_A: &str = "ES0021000000001234AB";
const CUPS_B: &str = "ES0021000000009876CD";

fn td20_hours_toml() -> String {
    let mut out = String::new();
    for hour in 1..=24u32 {
        let label = match hour {
            11..=14 | 19..=22 => "P1",
            9..=10 | 15..=18 | 23..=24 => "P2",
            _ => "P3",
        };
        writeln!(out, "{hour} = \"{label}\"").unwrap();
    }
    out
}

fn settings_toml() -> String {
    format!(
        r#"
[dispatchers]
"ENDESA ENERGÍA XXI" = "endesa"
"IBERDROLA CLIENTES" = "iberdrola"

[loads.TD20]
default = "P3"

[loads.TD20.seasons.normal]
months = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]

[loads.TD20.seasons.normal.hours]
{hours}

[tariffs]
indexed = [0.20, 0.15, 0.10, 0.0, 0.0, 0.0]

[[supplies]]
cups = "{CUPS_B}"
plan = "TD20"

[[supplies]]
cups = "{CUPS_A}"
plan = "TD20"
"#,
        hours = td20_hours_toml()
    )
}

fn endesa_document(cups: &str, bill_id: &str) -> String {
    format!(
        "ENDESA ENERGÍA XXI S.L.U.\n\
         Nº factura: {bill_id}\n\
         Fecha emisión factura: 05/03/2024\n\
         Periodo de facturación: 01/02/2024 - 01/03/2024\n\
         Potencia 3,45 kW x 28 días 12,34 €\n\
         Energía 220,00 kWh 45,67 €\n\
         Total 78,94 €\n\
         CUPS: {cups}\n\
         TOTAL 78,94 €\n"
    )
}

fn loads_csv(cups: &str) -> String {
    let mut out = String::from("cups,timestamp,kwh\n");
    // Three full February days inside the billing window.
    for day in 1..=3 {
        for hour in 0..24 {
            writeln!(out, "{cups},2024-02-{day:02} {hour:02}:00,1.0").unwrap();
        }
    }
    out
}

#[derive(Clone, Default)]
struct CaptureSink {
    records: Arc<Mutex<Vec<UnifiedRecord>>>,
}

#[async_trait]
impl ReportSink for CaptureSink {
    async fn emit(&self, records: &[UnifiedRecord]) -> bill_etl::Result<()> {
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    settings: Settings,
    documents: DirDocumentSource,
    loads: CsvLoadSource,
}

fn fixture() -> Result<Fixture> {
    let dir = TempDir::new()?;
    let docs_dir = dir.path().join("bills");
    std::fs::create_dir(&docs_dir)?;

    // Discovery order (sorted file names) is the reverse of the supplies
    // declaration order for CUPS_B.
    std::fs::write(docs_dir.join("01-a.txt"), endesa_document(CUPS_A, "F-A"))?;
    std::fs::write(docs_dir.join("02-b.txt"), endesa_document(CUPS_B, "F-B"))?;
    std::fs::write(
        docs_dir.join("03-unknown.txt"),
        "NATURGY IBERIA\nNº factura: X-1\n",
    )?;
    std::fs::write(
        docs_dir.join("04-broken.txt"),
        "ENDESA ENERGÍA XXI S.L.U.\nsin campos\n",
    )?;

    let loads_path = dir.path().join("loads.csv");
    std::fs::write(&loads_path, loads_csv(CUPS_A) + &loads_csv(CUPS_B)[19..])?;

    let settings = Settings::from_toml_str(&settings_toml())?;
    settings.validate()?;

    Ok(Fixture {
        documents: DirDocumentSource::new(&docs_dir, 0),
        loads: CsvLoadSource::new(&loads_path),
        settings,
        _dir: dir,
    })
}

#[tokio::test]
async fn end_to_end_run_emits_in_supply_order_and_isolates_bad_documents() -> Result<()> {
    let f = fixture()?;
    let sink = CaptureSink::default();
    let pipeline = ReportPipeline::new(&f.settings, f.documents, f.loads, sink.clone())?;

    let summary = pipeline.run().await?;

    assert_eq!(summary.documents_seen, 4);
    assert_eq!(summary.emitted, 2);
    // One unknown issuer, one malformed bill; neither aborted the run.
    assert_eq!(summary.skipped.len(), 2);
    assert!(summary
        .skipped
        .iter()
        .any(|s| s.name == "03-unknown.txt"));
    assert!(summary
        .skipped
        .iter()
        .any(|s| s.name == "04-broken.txt" && s.reason.contains("bill_id")));

    let records = sink.records.lock().unwrap();
    // CUPS_B is declared first in [supplies] even though its document sorts
    // second in the directory.
    assert_eq!(records[0].cups.as_str(), CUPS_B);
    assert_eq!(records[1].cups.as_str(), CUPS_A);

    // 72 hourly samples of 1.0 kWh each inside the window.
    let r = &records[1];
    assert!((r.classified_energy() - 72.0).abs() < 1e-9);
    assert_eq!(r.period_energy[&PeriodLabel::P1], 24.0);
    assert_eq!(r.period_energy[&PeriodLabel::P2], 24.0);
    assert_eq!(r.period_energy[&PeriodLabel::P3], 24.0);

    let avg = r.average_price.expect("average price should be present");
    assert!((avg - 78.94 / 72.0).abs() < 1e-9);

    let simulated = r.simulated_costs["indexed"];
    assert!((simulated - (24.0 * 0.20 + 24.0 * 0.15 + 24.0 * 0.10)).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn run_is_deterministic_across_invocations() -> Result<()> {
    let mut results = Vec::new();
    for _ in 0..2 {
        let f = fixture()?;
        let sink = CaptureSink::default();
        let pipeline =
            ReportPipeline::new(&f.settings, f.documents, f.loads, sink.clone())?;
        pipeline.run().await?;
        let records = sink.records.lock().unwrap().clone();
        results.push(records);
    }
    assert_eq!(results[0], results[1]);
    Ok(())
}

#[tokio::test]
async fn csv_sink_writes_header_and_rows() -> Result<()> {
    let f = fixture()?;
    let out_dir = TempDir::new()?;
    let out_path = out_dir.path().join("report.csv");
    let sink = CsvReportSink::new(&out_path, vec!["indexed".to_string()]);
    let pipeline = ReportPipeline::new(&f.settings, f.documents, f.loads, sink)?;

    pipeline.run().await?;

    let content = std::fs::read_to_string(&out_path)?;
    let mut lines = content.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("cups,issuer,bill_id"));
    assert!(header.contains("simulated_indexed"));
    assert_eq!(lines.count(), 2);
    assert!(content.contains(CUPS_A));
    assert!(content.contains(CUPS_B));
    Ok(())
}
