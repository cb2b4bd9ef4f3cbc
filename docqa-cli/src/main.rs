//! `docqa` entry point.

use std::process::ExitCode;

use clap::Parser;
use docqa_cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    docqa_cli::init_tracing(cli.verbose);

    match docqa_cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            tracing::debug!(error = ?err, "command failed");
            ExitCode::FAILURE
        }
    }
}
