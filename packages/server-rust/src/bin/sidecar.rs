use std::process::ExitCode;

use clap::Parser;
use sidecar_server::config::SidecarArgs;
use sidecar_server::orchestrator;
use sidecar_server::telemetry::init_logging;
use tracing::{error, info_span, Instrument};

#[tokio::main]
async fn main() -> ExitCode {
    let args = SidecarArgs::parse();

    if let Err(e) = init_logging(args.log_format) {
        eprintln!("failed to initialise logging: {e:#}");
        return ExitCode::FAILURE;
    }

    let span = info_span!("sidecar", prefix = %args.prefix());
    match orchestrator::run(&args).instrument(span).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "sidecar failed");
            ExitCode::FAILURE
        }
    }
}
