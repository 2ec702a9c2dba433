//! CLI command definitions

use clap::{Parser, Subcommand};
use sfu_auth::config::DEFAULT_ISSUER;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sfu-auth")]
#[command(about = "Token issuance and room registry for an SFU relay tier", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Full Redis URL (overrides REDIS_HOST, REDIS_PORT, REDIS_USERNAME, ...)
    #[arg(long, env = "REDIS_URL", global = true, hide_env_values = true)]
    pub redis_url: Option<String>,

    /// Token signing secret
    #[arg(long, env = "SFU_SIGNING_SECRET", global = true, hide_env_values = true)]
    pub signing_secret: Option<String>,

    /// Secret relay nodes send in the x-sfu-secret header
    #[arg(long, env = "SFU_INTERNAL_SECRET", global = true, hide_env_values = true)]
    pub internal_secret: Option<String>,

    /// Issuer claim written into and required from every token
    #[arg(long, env = "SFU_ISSUER", global = true, default_value = DEFAULT_ISSUER)]
    pub issuer: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "0.0.0.0:8080", env = "SFU_BIND")]
        bind: String,

        /// JSON file mapping session bearer tokens to users
        #[arg(long, env = "SFU_SESSIONS")]
        sessions: Option<PathBuf>,

        /// Keep all state in process memory instead of Redis (single instance only)
        #[arg(long)]
        memory_store: bool,
    },

    /// Mint a token for a user
    ///
    /// Examples:
    ///   sfu-auth mint --subject alice
    ///   sfu-auth mint --subject alice -c read
    Mint {
        /// Username to put in the token
        #[arg(long)]
        subject: String,

        /// Capability tier: read or write
        #[arg(short, long, default_value = "write", value_parser = parse_capability)]
        capability: String,

        /// Netplay display name to record with a write token
        #[arg(long)]
        alias: Option<String>,
    },

    /// Inspect or modify the room registry
    Rooms {
        #[command(subcommand)]
        command: RoomCommands,
    },

    /// Print a new random secret
    GenSecret,
}

#[derive(Subcommand)]
pub enum RoomCommands {
    /// List live rooms
    List,

    /// Show one room
    Show {
        /// Room name
        name: String,
    },

    /// Delete a room
    Delete {
        /// Room name
        name: String,
    },
}

fn parse_capability(s: &str) -> Result<String, String> {
    match s.to_lowercase().as_str() {
        "read" | "write" => Ok(s.to_lowercase()),
        _ => Err(format!("Invalid capability: {}. Must be read or write", s)),
    }
}
