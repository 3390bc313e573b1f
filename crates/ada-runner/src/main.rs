//! `ada`: download and filter disaster satellite imagery.
//!
//! Usage:
//! ```text
//! ada download --disaster cyclone-idai --dest input --maxpre 50 --maxpost 50
//! ada filter --dir input --mask data/ntl.geojson --country Mozambique --boundaries data/countries.geojson
//! ada run --disaster cyclone-idai --dest input --config filter.yaml --summary input/summary.json
//! ```

use ada_runner::cli::Cli;
use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());
    ada_metrics::describe_metrics();

    match cli.command.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}
