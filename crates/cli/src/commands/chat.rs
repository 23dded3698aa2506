//! `keepsake chat` — terminal front end for the batching pipeline.
//!
//! Every stdin line is one fragment. Lines sent in quick succession are
//! merged into a single batch, so pasting several `/photo` lines behaves like
//! forwarding an album.

use keepsake_agent::{AgentLoop, TurnPipeline};
use keepsake_batcher::{BatchAggregator, BatchSettings};
use keepsake_channels::ConsoleChannel;
use keepsake_config::AppConfig;
use keepsake_core::batch::{Fragment, MediaKind, MediaRef, SenderId};
use keepsake_core::event::{DomainEvent, EventBus};
use keepsake_store::{InMemoryMediaStore, InMemoryStore};
use keepsake_tools::{ToolSettings, default_registry};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};

const HELP: &str = "\
  Type a message and press Enter. Lines sent close together form one batch.
    /photo <ref> [caption]   attach an image
    /video <ref> [caption]   attach a video
    /audio <ref> [caption]   attach audio
    /doc <ref> [caption]     attach a document
    /help                    show this help
    /quit                    flush pending input and exit";

#[derive(Debug)]
enum ChatInput {
    Fragment(Fragment),
    Help,
    Quit,
    Skip,
}

/// Turn one stdin line into chat input.
fn parse_line(line: &str, message_id: String) -> Result<ChatInput, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ChatInput::Skip);
    }
    if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
        return Ok(ChatInput::Quit);
    }
    if line == "/help" {
        return Ok(ChatInput::Help);
    }

    let Some(command) = line.strip_prefix('/') else {
        return Ok(ChatInput::Fragment(Fragment::text(message_id, line)));
    };

    let mut parts = command.splitn(3, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let kind: MediaKind = verb.parse().map_err(|_| format!("unknown command '/{verb}', try /help"))?;
    let reference = parts
        .next()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| format!("usage: /{verb} <ref> [caption]"))?;
    let caption = parts.next().map(str::trim).filter(|c| !c.is_empty()).map(String::from);

    Ok(ChatInput::Fragment(Fragment::media(
        message_id,
        MediaRef::new(kind, reference),
        caption,
    )))
}

pub async fn run(
    sender: String,
    name: Option<String>,
    window_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(window_ms) = window_ms {
        config.batch.window_ms = window_ms;
        config.validate()?;
    }

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    KEEPSAKE_API_KEY=...");
        eprintln!("    ANTHROPIC_API_KEY=...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = keepsake_providers::build_from_config(&config)?;
    let events = Arc::new(EventBus::default());
    let tools = Arc::new(default_registry(&ToolSettings {
        bot_username: config.bot.username.clone(),
    }));
    let agent = AgentLoop::from_config(provider, tools, events.clone(), &config);
    let pipeline = TurnPipeline::new(
        agent,
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryMediaStore::new()),
        Arc::new(ConsoleChannel::new()),
        events.clone(),
    )
    .with_history_limit(config.agent.history_limit);
    let aggregator = BatchAggregator::new(Arc::new(pipeline), BatchSettings::from_config(&config.batch), events.clone());

    // Show when the agent starts working on a batch.
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let DomainEvent::BatchFlushed { fragments, media, .. } = &*event {
                eprintln!("  ... thinking about {fragments} message(s), {media} media");
            }
        }
    });

    println!();
    println!("  Keepsake — interactive chat");
    println!();
    println!("  Model:   {}", config.provider.model);
    println!("  Window:  {} ms", config.batch.window_ms);
    println!("  Sender:  {sender}");
    println!();
    println!("{HELP}");
    println!();

    let sender_id = SenderId::new(sender);
    tracing::info!(sender = %sender_id, window_ms = config.batch.window_ms, "Chat session started");
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut seq: u64 = 0;

    while let Some(line) = lines.next_line().await? {
        seq += 1;
        match parse_line(&line, format!("cli-{seq}")) {
            Ok(ChatInput::Fragment(mut fragment)) => {
                if let Some(name) = &name {
                    fragment = fragment.with_sender_name(name.clone());
                }
                aggregator.ingest(sender_id.clone(), fragment)?;
            }
            Ok(ChatInput::Help) => println!("{HELP}"),
            Ok(ChatInput::Quit) => break,
            Ok(ChatInput::Skip) => {}
            Err(e) => eprintln!("  {e}"),
        }
    }

    aggregator.shutdown().await;
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
