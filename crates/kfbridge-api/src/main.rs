//! kfbridge entry point.
//!
//! Binary name: `kfbridge`
//!
//! Loads `.env`, parses CLI arguments, loads configuration, then dispatches to
//! the command handler or starts the webhook server.

mod cli;

use clap::Parser;

use kfbridge_api::http::router::build_router;
use kfbridge_api::state::{AppState, open_context_store};
use kfbridge_core::cache::ContextCache;
use kfbridge_infra::config::load_config;
use kfbridge_observe::{TracingOptions, init_tracing, shutdown_tracing};
use kfbridge_types::config::BridgeConfig;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal in production.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).await?;

    let tracing_options = TracingOptions {
        json: config.logging.json,
        otel: config.logging.otel,
        ..TracingOptions::from_verbosity(cli.verbose)
    };
    init_tracing(&tracing_options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli, &mut config).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli, config: &mut BridgeConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await?;
        }

        Commands::Contexts { action } => {
            let store = open_context_store(config).await?;
            let result = cli::contexts::run(&store, action, cli.json).await;
            let _ = store.cache().close().await;
            result?;
        }

        Commands::Sign {
            timestamp,
            nonce,
            payload,
        } => {
            cli::crypto::sign(config, &timestamp, &nonce, &payload, cli.json)?;
        }

        Commands::Encrypt { text, receive_id } => {
            cli::crypto::encrypt(config, &text, receive_id.as_deref(), cli.json)?;
        }

        Commands::Decrypt { ciphertext } => {
            cli::crypto::decrypt(config, &ciphertext, cli.json)?;
        }

        Commands::Notify {
            user,
            text,
            markdown,
        } => {
            cli::notify::notify(config, &user, &text, markdown, cli.json).await?;
        }

        Commands::Check => {
            cli::check::check(config, cli.json).await?;
        }
    }

    Ok(())
}

async fn serve(config: &BridgeConfig) -> anyhow::Result<()> {
    let state = AppState::init(config).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "kfbridge listening");

    let router = build_router(state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.close().await;
    tracing::info!("server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
    tracing::info!("shutdown signal received, draining requests");
}
