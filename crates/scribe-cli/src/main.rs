//! scribe - interactive report-writing assistant console

mod config;

use std::io::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use scribe_agent::{EventSink, OutboundEvent, SessionRegistry, SupervisorConfig};
use scribe_ai::{ChatCompletionsSource, GenerationParams};
use scribe_store::JsonlStore;
use tokio::io::{AsyncBufReadExt, BufReader};

/// scribe - conversational report-writing assistant
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: qwen-plus)
    #[arg(short, long)]
    model: Option<String>,

    /// Chat-completions base URL
    #[arg(short, long)]
    base_url: Option<String>,

    /// Environment variable holding the API key
    #[arg(long)]
    api_key_env: Option<String>,

    /// Conversation to resume (defaults to a fresh one)
    #[arg(long)]
    conversation: Option<String>,

    /// Directory for conversation logs
    #[arg(long)]
    data_dir: Option<String>,

    /// Run a single prompt and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

/// Renders outbound events on the terminal
struct ConsoleSink;

#[async_trait]
impl EventSink for ConsoleSink {
    async fn emit(&self, _conversation_id: &str, event: &OutboundEvent) {
        match event {
            OutboundEvent::Chunk { text } => {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
            OutboundEvent::Complete { .. } => println!(),
            OutboundEvent::Interrupted => println!("\n[interrupted]"),
            OutboundEvent::Cancelled => println!("\n[cancelled]"),
            OutboundEvent::Error { message } => eprintln!("\nerror: {}", message),
            OutboundEvent::Prompt { question, options } => {
                if options.is_empty() {
                    println!("\n{}", question);
                } else {
                    println!("\n{} [{}]", question, options.join(" / "));
                }
            }
            OutboundEvent::Sync { phase } => println!("[{}]", phase),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("scribe=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "scribe=warn".into()),
            )
            .init();
    }

    if args.init_config {
        let path = config::Config::init()?;
        println!("Config file at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let cfg = config::Config::load();

    // Merge config with CLI args (CLI takes precedence)
    let defaults = GenerationParams::default();
    let generation = GenerationParams {
        model: args.model.or(cfg.model).unwrap_or(defaults.model),
        base_url: args.base_url.or(cfg.base_url).unwrap_or(defaults.base_url),
        system_prompt: cfg.system_prompt.or_else(|| {
            Some("You are an interactive report-writing assistant.".to_string())
        }),
        ..defaults
    };

    let api_key_env = args
        .api_key_env
        .or(cfg.api_key_env)
        .unwrap_or_else(|| "DASHSCOPE_API_KEY".to_string());
    let source = match ChatCompletionsSource::from_env(&api_key_env) {
        Ok(source) => Arc::new(source),
        Err(_) => {
            eprintln!("Error: no API key found");
            eprintln!("Set your API key with: export {}=your-key", api_key_env);
            eprintln!("Or point at another variable with: scribe --api-key-env NAME");
            std::process::exit(1);
        }
    };

    let store = match args.data_dir.or(cfg.data_dir) {
        Some(dir) => JsonlStore::open(dir)?,
        None => JsonlStore::open_default()?,
    };

    let registry = SessionRegistry::new(
        source,
        Arc::new(store),
        Arc::new(ConsoleSink),
        SupervisorConfig {
            generation,
            ..Default::default()
        },
    );

    let conversation_id = args
        .conversation
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let session = registry.get_or_create(&conversation_id).await;
    tracing::debug!(conversation = %conversation_id, turns = session.history().len(), "session ready");

    // One-shot mode
    if let Some(prompt) = args.command {
        session.dispatch(&prompt).await;
        return Ok(());
    }

    println!("scribe — conversation {}", conversation_id);
    println!("Type your instructions; \"stop\" interrupts a running generation. Ctrl-D exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        // Dispatch in the background so the next line can preempt a
        // generation that is still streaming.
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session.dispatch(&line).await;
        });
    }

    println!("\nbye");
    Ok(())
}
