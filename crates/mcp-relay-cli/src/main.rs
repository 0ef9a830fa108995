use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use futures::StreamExt;

use mcp_relay_agent::{relay, InMemoryRunState, RelayEvent, RelayOptions};
use mcp_relay_core::config::{Config, HistoryMode};
use mcp_relay_core::notification::RawNotification;
use mcp_relay_core::types::ResponseEvent;
use mcp_relay_transport::{logging_channel, LoggingSender, SseClient};

#[derive(Parser)]
#[command(
    name = "mcp-relay",
    about = "Relay MCP server notifications alongside an agent run stream",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay a notification feed and print streamed text
    Watch {
        /// SSE endpoint (overrides `server.url`)
        #[arg(long)]
        url: Option<String>,

        /// JSONL file replayed as the primary event stream
        #[arg(long)]
        replay: Option<PathBuf>,

        /// JSONL file of notifications or logging params fed through the
        /// logging channel
        #[arg(long)]
        inject: Option<PathBuf>,

        /// Commit every fragment to history as its own message
        #[arg(long)]
        per_fragment: bool,

        /// Advance the run one step after each history commit
        #[arg(long)]
        advance: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show resolved settings
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = if verbose { "debug" } else { config.log_level() };
    let mut env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    for directive in config.logging.iter().flat_map(|l| l.filters.iter()) {
        match directive.parse::<tracing_subscriber::filter::Directive>() {
            Ok(d) => env_filter = env_filter.add_directive(d),
            Err(e) => eprintln!("Ignoring invalid log filter {directive:?}: {e}"),
        }
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    if config.log_json() {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Read a JSONL file into primary stream items. Bad lines become errors so
/// the relay fails the same way a broken producer would.
async fn load_replay(path: &Path) -> anyhow::Result<Vec<anyhow::Result<serde_json::Value>>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(anyhow::Error::from))
        .collect())
}

/// Feed a JSONL file into the logging channel. Lines with a `method` are
/// forwarded as notifications (non-`notifications/` methods are skipped);
/// anything else is forwarded as logging params. Returns the number sent.
async fn inject_notifications(path: &Path, sender: &LoggingSender) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path).await?;
    let mut forwarded = 0;
    for line in raw.lines().filter(|line| !line.trim().is_empty()) {
        let value: serde_json::Value = serde_json::from_str(line)?;
        let sent = if value.get("method").is_some() {
            let notification: RawNotification = serde_json::from_value(value)?;
            if !notification.is_relevant() {
                tracing::debug!(method = %notification.method, "Skipping injected non-notification");
                continue;
            }
            sender.forward_notification(notification)
        } else {
            sender.forward(value)
        };
        if !sent {
            break;
        }
        forwarded += 1;
    }
    Ok(forwarded)
}

/// Text carried by a primary event, if it is a streamed text delta.
fn primary_delta(event: &serde_json::Value) -> Option<&str> {
    let data = event.get("data").unwrap_or(event);
    if data.get("type").and_then(|t| t.as_str()) == Some("response.output_text.delta") {
        data.get("delta").and_then(|d| d.as_str())
    } else {
        None
    }
}

async fn watch(
    config: &Config,
    url: Option<String>,
    replay: Option<PathBuf>,
    inject: Option<PathBuf>,
    per_fragment: bool,
    advance: bool,
) -> anyhow::Result<()> {
    let client = match (url, config.server.as_ref()) {
        (Some(url), _) => SseClient::new(url, config.connect_timeout())?,
        (None, Some(server)) => SseClient::from_config(server)?,
        (None, None) => anyhow::bail!("No SSE endpoint: pass --url or set server.url in config"),
    };

    let mut options = RelayOptions::from(&config.relay_settings());
    if per_fragment {
        options.history_mode = HistoryMode::PerFragment;
    }
    options.advance_after_commit |= advance;

    let primary_items = match replay {
        Some(path) => load_replay(&path).await?,
        None => Vec::new(),
    };
    let primary = futures::stream::iter(primary_items);

    let (sender, logging) = logging_channel();
    if let Some(path) = inject {
        let count = inject_notifications(&path, &sender).await?;
        tracing::info!(count, path = %path.display(), "Injected notifications");
    }
    // The logging side ends once everything queued has been relayed.
    drop(sender);
    let notifications = client.notifications(logging).await?;

    let (mut run, mut lifecycle) = InMemoryRunState::<serde_json::Value>::new();
    {
        let stream = relay(primary, notifications, &mut run, options);
        let mut stream = std::pin::pin!(stream);
        let mut stdout = std::io::stdout();
        while let Some(event) = stream.next().await {
            match event? {
                RelayEvent::Notification(ResponseEvent::OutputTextDelta { delta, .. }) => {
                    print!("{delta}");
                    stdout.flush()?;
                }
                RelayEvent::Notification(other) => {
                    tracing::debug!(kind = other.kind(), "UI event");
                }
                RelayEvent::Primary(event) => {
                    if let Some(delta) = primary_delta(&event) {
                        print!("{delta}");
                        stdout.flush()?;
                    }
                }
            }
        }
    }
    println!();

    let mut created = 0usize;
    while lifecycle.try_recv().is_ok() {
        created += 1;
    }
    tracing::info!(
        history_items = run.history().len(),
        lifecycle_events = created,
        "Relay finished"
    );
    for item in run.history() {
        let message = item.message();
        println!("[{}] {}", message.id, message.text());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);

    let config = Config::load(&config_path)?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Watch {
            url,
            replay,
            inject,
            per_fragment,
            advance,
        } => watch(&config, url, replay, inject, per_fragment, advance).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
        },
        Commands::Status => {
            let settings = config.relay_settings();
            println!("mcp-relay v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Server: {}", config.server_url().unwrap_or("(not set)"));
            println!("Poll interval: {:?}", config.poll_interval());
            println!("Idle grace ticks: {}", config.idle_grace_ticks());
            println!("History mode: {:?}", settings.history_mode);
            println!("Advance after commit: {}", settings.advance_after_commit);
        }
    }

    Ok(())
}
