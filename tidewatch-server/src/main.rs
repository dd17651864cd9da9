use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use miette::IntoDiagnostic;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};

use tidewatch_core::FusionEngine;
use tidewatch_server::feed::{AisFeed, RadarFeed};
use tidewatch_server::reporter::Reporter;
use tidewatch_server::sim::Fleet;
use tidewatch_server::web::WebServer;
use tidewatch_server::{config, Cli};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .parse_default_env()
        .init();

    let config = config::load(&cli)?;
    let origin = config.origin;
    let engine = Arc::new(FusionEngine::new(config).into_diagnostic()?);

    let fleet = Arc::new(Mutex::new(Fleet::new(
        cli.vessels,
        cli.ais_ratio,
        origin,
        cli.seed,
    )));
    log::info!(
        "Simulating {} vessels around ({:.5}, {:.5})",
        cli.vessels,
        origin.lat,
        origin.lon
    );

    let sweep = Duration::from_millis(cli.interval_ms.max(1));
    let radar = RadarFeed::new(engine.clone(), fleet.clone(), sweep);
    let ais = AisFeed::new(engine.clone(), fleet, sweep);
    let reporter = Reporter::new(engine.clone(), Duration::from_secs(cli.report_secs));
    let web = WebServer::new(engine, cli.port);

    Toplevel::new(|s| async move {
        s.start(SubsystemBuilder::new("radar", move |s: SubsystemHandle| {
            radar.run(s)
        }));
        s.start(SubsystemBuilder::new("ais", move |s: SubsystemHandle| ais.run(s)));
        s.start(SubsystemBuilder::new("reporter", move |s: SubsystemHandle| {
            reporter.run(s)
        }));
        s.start(SubsystemBuilder::new("web", move |s: SubsystemHandle| web.run(s)));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(1000))
    .await
    .map_err(Into::into)
}
