//! SFU auth CLI entry point

mod cli;

use crate::cli::{Cli, Commands, RoomCommands};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use clap::Parser;
use rand::Rng;
use serde_json::{json, Map, Value};
use sfu_auth::auth::{Capability, Secrets, TokenIssuer};
use sfu_auth::config::{RedisConfig, SfuConfig};
use sfu_auth::rooms::RoomRegistry;
use sfu_auth::server::{run_server, AppState};
use sfu_auth::session::{Principal, StaticSessions};
use sfu_auth::storage::{KvStore, MemoryStore, RedisStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = SfuConfig::default().with_issuer(cli.issuer.clone());
    let secrets = Secrets::new(cli.signing_secret.clone(), cli.internal_secret.clone())
        .context("Invalid secret configuration")?;

    match cli.command {
        Commands::Serve {
            bind,
            sessions,
            memory_store,
        } => {
            let store = if memory_store {
                warn!("Using in-memory store; state is not shared between instances");
                Arc::new(MemoryStore::new()) as Arc<dyn KvStore>
            } else {
                connect_store(cli.redis_url.as_deref()).await?
            };
            serve(config, secrets, store, bind, sessions).await
        }
        Commands::Mint {
            subject,
            capability,
            alias,
        } => mint(config, secrets, cli.redis_url.as_deref(), subject, capability, alias).await,
        Commands::Rooms { command } => {
            let store = connect_store(cli.redis_url.as_deref()).await?;
            rooms(config, store, command).await
        }
        Commands::GenSecret => {
            gen_secret();
            Ok(())
        }
    }
}

async fn connect_store(redis_url: Option<&str>) -> Result<Arc<dyn KvStore>> {
    let store = match redis_url {
        Some(url) => RedisStore::connect(url).await,
        None => RedisStore::new(&RedisConfig::from_env()).await,
    }
    .context("Failed to connect to Redis")?;

    Ok(Arc::new(store))
}

async fn serve(
    config: SfuConfig,
    secrets: Secrets,
    store: Arc<dyn KvStore>,
    bind: String,
    sessions_path: Option<PathBuf>,
) -> Result<()> {
    let sessions = match &sessions_path {
        Some(path) => StaticSessions::from_file(path)
            .with_context(|| format!("Failed to load sessions: {}", path.display()))?,
        None => {
            warn!("No sessions file given; token minting will reject every user");
            StaticSessions::new()
        }
    };
    info!(sessions = sessions.len(), "Loaded sessions");

    let bind_addr = bind.parse().context("Invalid bind address")?;
    let state = AppState::new(config, secrets, store, Arc::new(sessions));

    info!("Starting SFU auth server...");
    run_server(bind_addr, state, shutdown_signal()).await
}

async fn mint(
    config: SfuConfig,
    secrets: Secrets,
    redis_url: Option<&str>,
    subject: String,
    capability: String,
    alias: Option<String>,
) -> Result<()> {
    let key = secrets
        .signing
        .context("SFU_SIGNING_SECRET or --signing-secret required to mint tokens")?;
    let capability = Capability::parse(&capability).context("Invalid capability")?;

    // Read tokens never touch the store
    let store: Arc<dyn KvStore> = match capability {
        Capability::Read => Arc::new(MemoryStore::new()),
        Capability::Write => connect_store(redis_url).await?,
    };

    let mut settings = Map::new();
    if let Some(alias) = alias {
        settings.insert("netplay_username".to_string(), Value::String(alias));
    }
    let principal = Principal::new(subject).with_settings(settings);

    let issuer = TokenIssuer::new(Arc::new(config), key, store);
    let minted = issuer.mint(&principal, capability).await?;

    println!("{}", minted.token);
    println!();
    println!("Capability: {}", minted.capability);
    println!("Expires in: {}s", minted.expires);
    if let Some(token_id) = &minted.token_id {
        println!("Token ID:   {}", token_id);
    }

    Ok(())
}

async fn rooms(config: SfuConfig, store: Arc<dyn KvStore>, command: RoomCommands) -> Result<()> {
    let registry = RoomRegistry::new(Arc::new(config), store);

    match command {
        RoomCommands::List => {
            let rooms = registry.list().await?;
            if rooms.is_empty() {
                println!("(no rooms)");
            }
            for (name, room) in rooms {
                println!(
                    "{}  {}/{}{}  {}",
                    name,
                    room.current,
                    room.max,
                    if room.has_password { "  [password]" } else { "" },
                    room.node_id.as_deref().unwrap_or("-"),
                );
            }
        }
        RoomCommands::Show { name } => {
            let room = registry.resolve(&name).await?;
            println!("{}", serde_json::to_string_pretty(&room)?);
        }
        RoomCommands::Delete { name } => {
            let removed = registry.delete(&name).await?;
            println!("{}", json!({ "room_name": name, "removed": removed }));
        }
    }

    Ok(())
}

fn gen_secret() {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    println!("{}", URL_SAFE_NO_PAD.encode(bytes));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
