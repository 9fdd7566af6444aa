use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{generate_jwt, Claims, RoleClaimsEvaluator};
use crate::config::AppConfig;
use crate::storage::FsStorage;
use crate::{app, AppState};

#[derive(Parser)]
#[command(name = "arbor-api")]
#[command(about = "Authorized deletion service for a hierarchical, versioned tree store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Directory holding the databases")]
        location: Option<PathBuf>,
        #[arg(long, help = "Port to listen on")]
        port: Option<u16>,
    },

    #[command(about = "Print a signed access token for the configured secret")]
    Token {
        #[arg(long, help = "Token subject")]
        subject: String,
        #[arg(long = "role", help = "Granted scope, e.g. mydb-delete (repeatable)")]
        roles: Vec<String>,
    },
}

pub async fn run(cli: Cli, mut config: AppConfig) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve {
        location: None,
        port: None,
    }) {
        Commands::Serve { location, port } => {
            if let Some(location) = location {
                config.storage.location = location;
            }
            if let Some(port) = port {
                config.api.port = port;
            }
            serve(config).await
        }
        Commands::Token { subject, roles } => {
            let claims = Claims::new(subject, roles, config.security.jwt_expiry_hours);
            let token = generate_jwt(&claims, &config.security.jwt_secret)?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("SECURITY_JWT_SECRET must be set in {:?} mode", config.environment);
    }

    tokio::fs::create_dir_all(&config.storage.location)
        .await
        .with_context(|| format!("failed to create {}", config.storage.location.display()))?;

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    tracing::info!(
        "Serving databases from {} (timeout: {:?})",
        config.storage.location.display(),
        config.storage.blocking_timeout()
    );

    let state = AppState::new(config, Arc::new(FsStorage::new()), Arc::new(RoleClaimsEvaluator));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Arbor API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
