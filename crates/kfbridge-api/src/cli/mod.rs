//! CLI command definitions for the `kfbridge` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod check;
pub mod contexts;
pub mod crypto;
pub mod notify;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Bridge WeCom customer-service callbacks to a Coze workflow.
#[derive(Parser)]
#[command(name = "kfbridge", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file (defaults to $KFBRIDGE_CONFIG or ./kfbridge.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server.
    Serve {
        /// Host to bind to (overrides HOST / config).
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides PORT / config).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Inspect and manage cached conversation contexts.
    Contexts {
        #[command(subcommand)]
        action: contexts::ContextsCommand,
    },

    /// Compute a callback signature with the configured token.
    Sign {
        #[arg(long)]
        timestamp: String,

        #[arg(long)]
        nonce: String,

        /// The `Encrypt` field (or `echostr`) to sign.
        #[arg(long)]
        payload: String,
    },

    /// Encrypt a plaintext payload with the configured encoding key.
    Encrypt {
        text: String,

        /// Trailing receive id (defaults to the configured corp id).
        #[arg(long)]
        receive_id: Option<String>,
    },

    /// Decrypt a base64 ciphertext with the configured encoding key.
    Decrypt { ciphertext: String },

    /// Send an application message to an internal user.
    Notify {
        /// Recipient user id (`@all` for everyone).
        user: String,

        text: String,

        /// Send as markdown instead of plain text.
        #[arg(long)]
        markdown: bool,
    },

    /// Validate configuration and check the context cache.
    Check,
}
