//! # docqa-cli
//!
//! The `docqa` command: ingest one document, then answer questions about it
//! with the passages each answer was based on.
//!
//! ```text
//! docqa ask report.pdf -q "What was the revenue in 2023?"
//! docqa ask notes.md --embedder mock < questions.txt
//! docqa chunks notes.md --chunk-size 500 --chunk-overlap 100
//! ```

pub mod cli;
pub mod commands;
pub mod output;
pub mod settings;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use cli::{Cli, Commands};
pub use settings::Settings;

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks warn, debug or trace.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,docqa_rag=debug,docqa_cli=debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Ask(args) => commands::ask(args, settings, cli.json).await,
        Commands::Chunks(args) => commands::chunks(args, settings, cli.json).await,
    }
}
