use anyhow::{Context, Result};
use clap::Parser;
use meshchat_core::config::Config;
use meshchat_core::core_chat::{ChatClient, GroupKind};
use meshchat_core::core_crypto::DalekCrypto;
use meshchat_core::core_graph::MemoryGraph;
use meshchat_core::core_identity::IdentityManager;
use meshchat_core::logging::{init_logging_with_config, LogLevel};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "meshchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run two local users through a channel invite and one message
    Demo {
        /// Channel name
        #[arg(default_value = "general")]
        channel: String,

        /// Message Alice sends
        #[arg(default_value = "hello")]
        message: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let path = shellexpand::tilde(path);
            Config::from_file(&*path).with_context(|| format!("loading {}", path))?
        }
        None => Config::from_env()?,
    };

    if let Some(level) = &args.log_level {
        match LogLevel::from_str(level) {
            Ok(level) => config.logging.level = level.as_str().to_string(),
            Err(_) => eprintln!("Invalid log level '{}', using '{}'", level, config.logging.level),
        }
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    Ok(config)
}

/// Drain both clients until neither has queued updates
async fn settle(alice: &mut ChatClient, bob: &mut ChatClient) {
    while alice.process_pending().await + bob.process_pending().await > 0 {}
}

async fn run_demo(config: Config, channel: &str, message: &str) -> Result<()> {
    let graph = Arc::new(MemoryGraph::new());
    let crypto = Arc::new(DalekCrypto::new());
    let identities = IdentityManager::new(graph.clone(), crypto.clone());

    let mut alice = ChatClient::new(graph.clone(), crypto.clone(), config.clone());
    alice.login(identities.register("alice", "Alice").await?).await?;
    let bob_session = identities.register("bob", "Bob").await?;
    let bob_key = bob_session.public_key().clone();
    let mut bob = ChatClient::new(graph.clone(), crypto, config);
    bob.login(bob_session).await?;

    let id = alice.create_channel(channel).await?;
    settle(&mut alice, &mut bob).await;
    alice
        .invite_to_group(GroupKind::Channel, &id, &bob_key, "bob")
        .await?;
    settle(&mut alice, &mut bob).await;

    let invite_id = bob
        .channel_invites()
        .first()
        .map(|invite| invite.invite_id.clone())
        .context("invite never reached bob")?;
    bob.accept_group_invite(GroupKind::Channel, &invite_id).await?;
    settle(&mut alice, &mut bob).await;

    alice
        .send_group_message(GroupKind::Channel, &id, message)
        .await?;
    settle(&mut alice, &mut bob).await;
    if let Some(group) = bob.group(GroupKind::Channel, &id) {
        info!(channel = %group.name, unread = group.unread_count, "bob before viewing");
    }

    bob.load_group_messages(GroupKind::Channel, &id).await?;
    settle(&mut alice, &mut bob).await;
    for line in bob.messages() {
        println!("[{}] {}: {}", line.timestamp, line.sender_name, line.text);
    }
    if let Some(group) = bob.group(GroupKind::Channel, &id) {
        info!(channel = %group.name, unread = group.unread_count, "bob after viewing");
    }

    info!(writes = graph.write_count(), leaves = graph.leaf_count(), "demo finished");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(config.logging.to_log_config()?)?;

    info!("MeshChat CLI started");

    match args.command {
        Some(Command::Demo { channel, message }) => {
            run_demo(config, &channel, &message).await?;
        }
        Some(Command::Config) => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        None => {
            warn!("No command specified. Use --help for usage information.");
        }
    }

    info!("MeshChat CLI finished");

    Ok(())
}
