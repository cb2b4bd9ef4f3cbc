//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "docqa", version, about = "Ask questions about a document and get cited answers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON settings file with `rag` and `gemini` sections
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a document and answer questions about it
    Ask(AskArgs),

    /// Show how a document is split into retrievable units
    Chunks(ChunksArgs),
}

/// Overrides for the chunking settings.
#[derive(Args, Debug, Clone, Default)]
pub struct ChunkingArgs {
    /// Maximum characters per unit
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Maximum characters shared by consecutive units
    #[arg(long)]
    pub chunk_overlap: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    /// Document to ingest (.txt, .md or .pdf)
    pub file: PathBuf,

    /// Question to ask; repeat for several. Reads one question per line from stdin when omitted.
    #[arg(short, long = "question", value_name = "QUESTION")]
    pub questions: Vec<String>,

    /// Gemini API key (defaults to GOOGLE_API_KEY)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    #[command(flatten)]
    pub chunking: ChunkingArgs,

    /// Number of passages retrieved per question
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Embedding backend. `local` runs all-MiniLM-L6-v2 without an API key for
    /// embeddings but is only compiled in with `--features local`
    #[arg(long, value_enum, default_value_t = EmbedderKind::Gemini)]
    pub embedder: EmbedderKind,

    /// Gemini model used for answers
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ChunksArgs {
    /// Document to split
    pub file: PathBuf,

    #[command(flatten)]
    pub chunking: ChunkingArgs,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    /// Gemini `text-embedding-004` over HTTPS
    Gemini,
    /// all-MiniLM-L6-v2 in-process (needs the `local` feature)
    Local,
    /// Deterministic hashed bag-of-words, offline
    Mock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_questions_and_overrides() {
        let cli = Cli::parse_from([
            "docqa", "ask", "notes.md", "-q", "first?", "-q", "second?", "--chunk-size", "500",
            "--top-k", "2", "--embedder", "mock", "--json",
        ]);
        assert!(cli.json);
        let Commands::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.questions, ["first?", "second?"]);
        assert_eq!(args.chunking.chunk_size, Some(500));
        assert_eq!(args.top_k, Some(2));
        assert_eq!(args.embedder, EmbedderKind::Mock);
    }

    #[test]
    fn verbose_counts() {
        let cli = Cli::parse_from(["docqa", "-vv", "chunks", "a.txt"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn command_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
