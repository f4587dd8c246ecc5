//! vlanrecon - VLAN topology reconciler
//!
//! Entry point for the `vlanrecon` command.

use clap::{CommandFactory, Parser};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vlanrecon::cli::{self, Cli};

/// Initializes tracing; `RUST_LOG` overrides the command line level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_logging(&args.log_level);

    let invocation = match args.invocation() {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{}", Cli::command().render_usage());
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = args.config();
    info!(
        platform = %config.platform,
        dry_run = args.dry_run,
        ?invocation,
        "Starting vlanrecon"
    );

    match cli::execute(config, &invocation).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("vlanrecon: {}", e);
            ExitCode::FAILURE
        }
    }
}
