//! Request one cursor completion for a file and print it.
//!
//! Reads an optional API key from the `NUDGE_API_KEY` environment variable.
//! Logs go to stderr; stdout carries only the suggestion (or the prompt in
//! `--dry-run` mode).
//!
//! # Examples
//!
//! ```sh
//! # Complete at line 12, column 9 against a local server
//! nudge --file src/main.rs --line 12 --column 9
//!
//! # Inspect the assembled prompt without calling the backend
//! nudge --file app.py --line 3 --column 1 --dry-run
//!
//! # Use a settings file and a remote endpoint
//! nudge --file lib.ts --line 40 --column 5 --config nudge.json \
//!   --server-url https://llm.example.com --model coder-large
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use nudge::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Request one cursor completion for a file and print it.
#[derive(Parser)]
#[command(name = "nudge")]
struct Cli {
    // ── Cursor ─────────────────────────────────────────────────
    /// File to complete in
    #[arg(long)]
    file: PathBuf,

    /// Cursor line (1-based)
    #[arg(long)]
    line: usize,

    /// Cursor column (1-based, in characters)
    #[arg(long)]
    column: usize,

    /// Editor language id; guessed from the extension when omitted
    #[arg(long)]
    language: Option<String>,

    // ── Backend ────────────────────────────────────────────────
    /// JSON settings file (`{"completion": {...}, "session": {...}}`)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the backend base URL
    #[arg(long)]
    server_url: Option<String>,

    /// Override the model
    #[arg(long)]
    model: Option<String>,

    /// Override the request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Prompt token budget (default: the manual budget from settings)
    #[arg(long)]
    budget: Option<usize>,

    // ── Output ─────────────────────────────────────────────────
    /// Print the assembled prompt instead of calling the backend
    #[arg(long)]
    dry_run: bool,

    /// Debug-level logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "nudge=debug" } else { "nudge=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let settings = match &cli.config {
        Some(path) => Settings::from_json_file(path)?,
        None => Settings::default(),
    };

    let mut completion = settings.completion.with_api_key_from_env("NUDGE_API_KEY");
    if let Some(url) = cli.server_url {
        completion = completion.with_server_url(url);
    }
    if let Some(model) = cli.model {
        completion = completion.with_model(model);
    }
    if let Some(ms) = cli.timeout_ms {
        completion = completion.with_timeout_ms(ms);
    }

    let content = std::fs::read_to_string(&cli.file)
        .map_err(|e| format!("failed to read {}: {e}", cli.file.display()))?;
    let language = cli
        .language
        .unwrap_or_else(|| language_from_path(&cli.file).to_string());
    let file_id = cli.file.to_string_lossy().to_string();
    let position = Position::new(cli.line.saturating_sub(1), cli.column.saturating_sub(1));

    let mut request = CompletionRequest::manual(file_id, language, content, position);
    if let Some(budget) = cli.budget {
        request = request.with_budget(budget);
    }

    let client = CompletionClient::new().map_err(|e| e.to_string())?;
    let session = CompletionSession::new(client, completion, settings.session)
        .with_event_handler(Arc::new(LoggingHandler));

    if cli.dry_run {
        let prompt = session.preview_prompt(&request);
        tracing::info!(
            "Prompt: ~{} tokens, sections [{}]",
            prompt.estimated_tokens,
            prompt.sections.join(", ")
        );
        println!("{}", prompt.text);
        return Ok(());
    }

    match session
        .request_completion(request)
        .await
        .map_err(|e| e.to_string())?
    {
        Some(text) => println!("{text}"),
        None => tracing::info!("No suggestion"),
    }
    Ok(())
}
