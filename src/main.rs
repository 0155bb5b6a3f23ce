//! Brief - streaming summaries from the terminal
//!
//! Reads content from a file (or stdin), streams the model's answer to
//! stdout and then accepts follow-up questions until an empty line. Ctrl+C
//! stops the answer currently streaming.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, info};
use uuid::Uuid;

use brief::native::ProviderKind;
use brief::{
    ChannelSink, Config, Conversation, EventSink, Input, Orchestrator, Outcome, SubmitRequest,
    UiEvent,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File with the content to send, or `-` to read stdin (disables follow-ups)
    input: PathBuf,

    /// Prompt replacing the system prompt for the first answer
    #[arg(short, long)]
    prompt: Option<String>,

    /// Name shown for the custom prompt, as in `/tldr`
    #[arg(short, long, requires = "prompt")]
    command: Option<String>,

    /// Provider family (openai, anthropic, azure, gemini); overrides BRIEF_PROVIDER
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Model to use; overrides BRIEF_MODEL
    #[arg(short, long)]
    model: Option<String>,

    /// Print the request that would be sent instead of sending it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Stdout carries the answer, so logs go to stderr
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brief=warn".into()),
        )
        .with_writer(io::stderr)
        .with_target(true);
    if std::env::var("BRIEF_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if let Some(model) = cli.model.clone() {
        config.model = model;
    }
    config.debug_mode |= cli.dry_run;
    info!(provider = %config.provider, "Configuration loaded successfully");

    brief::observability::describe_metrics();

    let follow_ups = cli.input.as_os_str() != "-";
    let content = read_content(&cli.input)?;

    let http_client = reqwest::Client::builder()
        .pool_max_idle_per_host(4)
        .build()?;
    let orchestrator = Arc::new(Orchestrator::with_http_client(config, http_client));

    let (sink, mut events) = ChannelSink::new();
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let id = Uuid::new_v4().to_string();
    let mut conversation = Conversation::new();

    let mut request = SubmitRequest::new(id.clone(), content, sink.clone());
    if let Some(prompt) = cli.prompt {
        request = request.with_custom_prompt(prompt);
    }
    if let Some(command) = cli.command {
        request = request.with_command_name(command);
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let outcome = stream_answer(&orchestrator, request, &mut events, &mut conversation).await?;
        debug!(outcome = outcome.label(), "Answer finished");

        if outcome.response().is_none() {
            conversation.discard_pending();
        }
        if !follow_ups || !conversation.is_started() {
            break;
        }

        eprint!("\n> ");
        let line = tokio::select! {
            line = stdin.next_line() => line.context("Failed to read follow-up")?,
            _ = signal::ctrl_c() => None,
        };
        let question = match line {
            Some(q) if !q.trim().is_empty() => q,
            _ => break,
        };

        let input: Input = conversation.follow_up(question.trim());
        request = SubmitRequest::new(id.clone(), input, sink.clone());
    }

    Ok(())
}

fn read_content(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read content from stdin")?;
        return Ok(content);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Submit one request and render its events until it finishes
async fn stream_answer(
    orchestrator: &Arc<Orchestrator>,
    request: SubmitRequest,
    events: &mut tokio::sync::mpsc::UnboundedReceiver<UiEvent>,
    conversation: &mut Conversation,
) -> Result<Outcome> {
    let id = request.id.clone();
    let mut task = orchestrator.submit(request);

    let outcome = loop {
        tokio::select! {
            Some(event) = events.recv() => render(event, conversation)?,
            _ = signal::ctrl_c() => {
                orchestrator.cancel(&id);
            }
            result = &mut task => break result.context("Request task failed")?,
        }
    };

    while let Ok(event) = events.try_recv() {
        render(event, conversation)?;
    }
    Ok(outcome)
}

fn render(event: UiEvent, conversation: &mut Conversation) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match event {
        UiEvent::Delta { text, .. } | UiEvent::Notice { text, .. } => {
            write!(stdout, "{}", text)?;
            stdout.flush()?;
        }
        UiEvent::StreamEnd {
            full_response,
            original_context,
            ..
        } => {
            writeln!(stdout)?;
            conversation.record_response(&full_response, original_context.as_deref());
        }
        UiEvent::Error { message, .. } => {
            eprintln!("[Error] {}", message);
        }
        UiEvent::LoadingStarted { .. }
        | UiEvent::LoadingEnded { .. }
        | UiEvent::InputUnlocked { .. } => {}
    }
    Ok(())
}
