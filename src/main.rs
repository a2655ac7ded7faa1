use bill_etl::utils::{logger, validation::Validate};
use bill_etl::{
    CliConfig, CsvLoadSource, CsvReportSink, DirDocumentSource, ReportPipeline, Settings,
};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose, cli.quiet);
    tracing::info!("starting bill-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let settings = match Settings::from_file(&cli.config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("cannot load '{}': {e}", cli.config.display());
            std::process::exit(1);
        }
    };
    if let Err(e) = settings.validate() {
        tracing::error!("configuration validation failed: {e}");
        std::process::exit(1);
    }

    let documents = DirDocumentSource::new(&cli.documents, cli.limit);
    let loads = CsvLoadSource::new(&cli.loads);
    let sink = CsvReportSink::new(&cli.output, settings.tariffs.keys().cloned().collect());

    let pipeline = match ReportPipeline::new(&settings, documents, loads, sink) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("cannot build pipeline: {e}");
            std::process::exit(1);
        }
    };

    match pipeline.run().await {
        Ok(summary) => {
            tracing::info!(
                "report written to '{}' ({} records)",
                cli.output.display(),
                summary.emitted
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("run failed: {e}");
            std::process::exit(1);
        }
    }
}
