//! yukibot - chat platform bot host.
//!
//! Wires the gateway session to the real HTTP and WebSocket
//! collaborators and consumes the emitted events. Connection recovery
//! lives entirely inside the session; this binary only logs events and
//! exits when the session reports a fatal failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use yuki_gateway::{GatewaySession, RestProvisioner, SessionEvent, WebSocketTransport};

mod config;

use config::BotConfig;

#[derive(Parser)]
#[command(name = "yukibot")]
#[command(about = "Chat bot gateway host")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "yukibot.json")]
        config: PathBuf,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "yukibot.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("yukibot=info".parse()?)
                .add_directive("yuki_gateway=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run_bot(&config).await,
        Commands::InitConfig { output } => init_config(&output),
    }
}

async fn run_bot(config_path: &Path) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting yukibot");
    let config = BotConfig::from_file(config_path)?;
    info!(api = %config.api_base_url, compress = config.compress, "loaded config");

    let provisioner = Arc::new(RestProvisioner::new(
        config.api_base_url.clone(),
        config.token.clone(),
    ));
    let transport = Arc::new(WebSocketTransport);
    let (session, handle, mut events) =
        GatewaySession::new(provisioner, transport, config.session_config());
    let session_task = tokio::spawn(session.run());

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::TextChannel(event) => {
                info!(
                    channel = %event.target_id,
                    author = %event.author_id,
                    content = %event.content,
                    "channel message"
                );
            }
            SessionEvent::System(event) => {
                info!(msg_id = %event.msg_id, "system event");
            }
            SessionEvent::Reset => {
                warn!("session reset, conversational context dropped");
            }
            SessionEvent::SevereError(message) => {
                error!(%message, "gateway session failed");
                break;
            }
        }
    }

    handle.shutdown().await;
    match session_task.await.context("session task panicked")? {
        Ok(()) => Ok(()),
        Err(error) => Err(error).context("gateway session terminated"),
    }
}

fn init_config(output: &Path) -> anyhow::Result<()> {
    let sample = BotConfig::sample();
    let content = serde_json::to_string_pretty(&sample).context("serialize sample config")?;
    std::fs::write(output, content)
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    info!(path = %output.display(), "wrote sample config");
    Ok(())
}
