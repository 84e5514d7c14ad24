mod repl;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use analyzer_contracts::config::AnalyzerConfig;
use analyzer_contracts::conversation::Conversation;
use analyzer_contracts::store::{InteractionRecord, InteractionStore};
use analyzer_engine::codec;
use analyzer_engine::AnalyzerEngine;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::repl::{write_submission, ChatSession};

#[derive(Debug, Parser)]
#[command(name = "analyzer", version, about = "Ask a local vision model about images")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Model server generate endpoint (overrides ANALYZER_ENDPOINT).
    #[arg(long, global = true)]
    endpoint: Option<String>,
    #[arg(long, global = true)]
    model: Option<String>,
    /// SQLite interaction log (overrides ANALYZER_DB).
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Inference timeout in seconds.
    #[arg(long, global = true)]
    timeout: Option<f64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe the model service.
    Check,
    /// Ask one question about one image.
    Ask(AskArgs),
    /// Interactive session.
    Chat(ChatArgs),
    /// Render a saved session as a PDF report.
    Export(ExportArgs),
    /// List recently stored interactions.
    History(HistoryArgs),
}

#[derive(Debug, Args)]
struct AskArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    question: String,
    #[arg(long)]
    session: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    session: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(long)]
    session: PathBuf,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("analyzer error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = resolve_config(&cli.global);
    debug!(endpoint = %config.endpoint, model = %config.model, db = %config.db_path.display(), "configuration resolved");
    match cli.command {
        Command::Check => run_check(&config),
        Command::Ask(args) => run_ask(&config, args),
        Command::Chat(args) => run_chat(&config, args),
        Command::Export(args) => run_export(&config, args),
        Command::History(args) => run_history(&config, args),
    }
}

fn resolve_config(global: &GlobalArgs) -> AnalyzerConfig {
    AnalyzerConfig::from_env()
        .with_endpoint(global.endpoint.clone())
        .with_model(global.model.clone())
        .with_db_path(global.db.clone())
        .with_inference_timeout(global.timeout)
}

fn run_check(config: &AnalyzerConfig) -> Result<i32> {
    let engine = AnalyzerEngine::from_config(config)?;
    let status = engine.health_check();
    if status.ok {
        println!("Model service OK: {} at {}", config.model, config.endpoint);
        Ok(0)
    } else {
        eprintln!("{}", status.message.unwrap_or_default());
        Ok(1)
    }
}

fn run_ask(config: &AnalyzerConfig, args: AskArgs) -> Result<i32> {
    let engine = AnalyzerEngine::from_config(config)?;
    let image = codec::load(&args.image)?;
    let mut conversation = load_session(args.session.as_deref())?;

    let mut stdout = io::stdout();
    let updates = engine.submit(Some(&image), &args.question, &mut conversation);
    write_submission(&mut stdout, updates)?;
    stdout.flush()?;

    if let Some(path) = args.session.as_deref() {
        conversation.save(path)?;
    }
    Ok(0)
}

fn run_chat(config: &AnalyzerConfig, args: ChatArgs) -> Result<i32> {
    let engine = AnalyzerEngine::from_config(config)?;
    let status = engine.health_check();
    if !status.ok {
        eprintln!(
            "Cannot reach the model service at {}.\n{}\nStart the model server and try again.",
            config.endpoint,
            status.message.unwrap_or_default()
        );
        return Ok(1);
    }

    let conversation = load_session(args.session.as_deref())?;
    let mut session = ChatSession::new(&engine, conversation, args.session);
    if let Some(path) = args.image.as_deref() {
        session.set_image(path, &mut io::stdout())?;
    }
    println!(
        "PRO ANALYZER chat with {}. Type /help for commands.",
        engine.model_name()
    );
    session.run(io::stdin().lock(), io::stdout())?;
    Ok(0)
}

fn run_export(config: &AnalyzerConfig, args: ExportArgs) -> Result<i32> {
    let conversation = Conversation::load(&args.session)?;
    let engine = AnalyzerEngine::from_config(config)?;
    let path = engine.export_report(&conversation, args.out.as_deref())?;
    println!("{}", path.display());
    Ok(0)
}

fn run_history(config: &AnalyzerConfig, args: HistoryArgs) -> Result<i32> {
    let store = InteractionStore::open_read_only(&config.db_path)?;
    let records = store.recent(args.limit)?;
    if records.is_empty() {
        println!("No interactions stored yet.");
    }
    for record in &records {
        println!("{}", history_line(record));
    }
    Ok(0)
}

fn load_session(path: Option<&Path>) -> Result<Conversation> {
    match path {
        Some(path) if path.exists() => Conversation::load(path)
            .with_context(|| format!("failed to resume session {}", path.display())),
        _ => Ok(Conversation::new()),
    }
}

fn history_line(record: &InteractionRecord) -> String {
    let duration = record
        .duration()
        .map(|seconds| format!(" ({seconds:.2} s)"))
        .unwrap_or_default();
    format!(
        "#{} {} [{}]{} {} -> {}",
        record.id,
        record.timestamp,
        record.model,
        duration,
        clamp_text(&record.prompt, 60),
        clamp_text(&record.response, 80)
    )
}

fn clamp_text(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let mut clipped: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}
