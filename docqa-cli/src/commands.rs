//! `ask` and `chunks` command implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use docqa_rag::{
    Chunker, DocumentSession, DocumentText, EmbeddingProvider, Generator, MockEmbeddingProvider,
    RagError, RagPipeline, RecursiveChunker, extract_text, media_type_for_path,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::cli::{AskArgs, ChunksArgs, EmbedderKind};
use crate::output::{AnswerOutput, ChunksOutput, render};
use crate::settings::Settings;

/// Read a document from disk and extract its text.
pub async fn load_document(path: &Path) -> Result<DocumentText> {
    let media_type = media_type_for_path(path).ok_or_else(|| {
        anyhow!("unsupported file type {} (expected .txt, .md or .pdf)", path.display())
    })?;
    let bytes =
        tokio::fs::read(path).await.with_context(|| format!("failed to read {}", path.display()))?;
    extract_text(&bytes, media_type).await.map_err(user_facing)
}

/// Lead with the end-user message and keep the full error as its cause.
fn user_facing(e: RagError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

pub async fn chunks(args: ChunksArgs, mut settings: Settings, json: bool) -> Result<()> {
    settings.apply_chunking(&args.chunking)?;
    let document = load_document(&args.file).await?;
    let units = RecursiveChunker::from_config(&settings.rag)?.split(&document);

    let output = ChunksOutput::new(settings.rag.chunk_size, settings.rag.chunk_overlap, &units);
    println!("{}", render(&output, json));
    Ok(())
}

pub async fn ask(args: AskArgs, mut settings: Settings, json: bool) -> Result<()> {
    settings.apply_ask(&args)?;

    let embedder = embedding_provider(args.embedder, &settings)?;
    let generator = generator(&settings)?;
    let pipeline = RagPipeline::builder()
        .config(settings.rag.clone())
        .embedding_provider(embedder)
        .generator(generator)
        .build()?;

    let mut session = DocumentSession::new(Arc::new(pipeline));
    let document = load_document(&args.file).await?;
    let index = session.ingest(&document).await.map_err(user_facing)?;
    info!(file = %args.file.display(), unit_count = index.len(), "document indexed");

    let mut stdout = tokio::io::stdout();
    if args.questions.is_empty() {
        if !json {
            eprintln!(
                "Indexed {} ({} units). Ask a question, one per line; Ctrl-D to quit.",
                args.file.display(),
                index.len()
            );
        }
        let stdin = BufReader::new(tokio::io::stdin());
        answer_lines(&session, stdin, &mut stdout, json).await
    } else {
        answer_all(&session, &args.questions, &mut stdout, json).await
    }
}

/// Answer each question in order, writing one rendered result per question.
///
/// A failed question is reported in the output and does not stop the rest.
pub async fn answer_all<W>(
    session: &DocumentSession,
    questions: &[String],
    out: &mut W,
    json: bool,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for question in questions {
        answer_one(session, question, out, json).await?;
    }
    Ok(())
}

/// Answer one question per non-blank line of `input` until EOF.
pub async fn answer_lines<R, W>(
    session: &DocumentSession,
    input: R,
    out: &mut W,
    json: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("failed to read question")? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        answer_one(session, question, out, json).await?;
    }
    Ok(())
}

async fn answer_one<W>(
    session: &DocumentSession,
    question: &str,
    out: &mut W,
    json: bool,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let output = match session.ask(question).await {
        Ok(answer) => AnswerOutput::answered(question, &answer),
        Err(e) => {
            warn!(error = %e, "question failed");
            AnswerOutput::failed(question, &e)
        }
    };
    let mut rendered = render(&output, json);
    rendered.push('\n');
    out.write_all(rendered.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

fn embedding_provider(
    kind: EmbedderKind,
    settings: &Settings,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match kind {
        EmbedderKind::Mock => Ok(Arc::new(MockEmbeddingProvider::default())),
        EmbedderKind::Local => local_embedder(),
        EmbedderKind::Gemini => gemini::embedder(settings),
    }
}

#[cfg(feature = "local")]
fn local_embedder() -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(docqa_rag::LocalEmbeddingProvider::new()))
}

#[cfg(not(feature = "local"))]
fn local_embedder() -> Result<Arc<dyn EmbeddingProvider>> {
    bail!("this build has no local embedding model; rebuild with `--features local`")
}

fn generator(settings: &Settings) -> Result<Arc<dyn Generator>> {
    gemini::generator(settings)
}

#[cfg(feature = "gemini")]
mod gemini {
    use docqa_rag::{GeminiConfig, GeminiEmbeddingProvider, GeminiGenerator};

    use super::*;
    use crate::settings::API_KEY_ENV;

    fn config(settings: &Settings) -> Result<GeminiConfig> {
        let api_key = settings
            .api_key()
            .ok_or_else(|| anyhow!("no Gemini API key: pass --api-key or set {API_KEY_ENV}"))?;
        let file = &settings.gemini;
        let mut config = GeminiConfig::new(api_key);
        if let Some(model) = &file.model {
            config = config.with_model(model);
        }
        if let Some(model) = &file.embedding_model {
            config = config.with_embedding_model(model);
        }
        if let Some(url) = &file.base_url {
            config = config.with_base_url(url);
        }
        if let Some(secs) = file.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(limit) = file.max_prompt_chars {
            config.max_prompt_chars = limit;
        }
        if let Some(retries) = file.max_retries {
            config.max_retries = retries;
        }
        Ok(config)
    }

    pub(super) fn embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(Arc::new(GeminiEmbeddingProvider::new(config(settings)?)?))
    }

    pub(super) fn generator(settings: &Settings) -> Result<Arc<dyn Generator>> {
        Ok(Arc::new(GeminiGenerator::new(config(settings)?)?))
    }
}

#[cfg(not(feature = "gemini"))]
mod gemini {
    use super::*;

    pub(super) fn embedder(_settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
        bail!("this build has no Gemini support; rebuild with `--features gemini`")
    }

    pub(super) fn generator(_settings: &Settings) -> Result<Arc<dyn Generator>> {
        bail!("this build has no Gemini support; answers need `--features gemini`")
    }
}
