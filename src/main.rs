use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

use orodc::error::OrodcError;
use orodc::pipeline::{self, Cli};

/// Environment variable holding a log filter directive.
const LOG_ENV: &str = "ORODC_LOG";

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_line_number(verbose >= 3)
        .init();

    debug!("orodc started with verbosity level: {verbose}");
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match pipeline::run(&cli).map_err(anyhow::Error::from) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("orodc: error: {err:#}");
            let code = err
                .downcast_ref::<OrodcError>()
                .map_or(1, OrodcError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
