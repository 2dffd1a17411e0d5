// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;

use auth_server::{
    api::router,
    auth::TokenCodec,
    config::{LogFormat, ServerConfig},
    diagnostics::span_events,
    directory::{DirectoryError, InMemoryUserDirectory, UserDirectory},
    revocation::{RevocationPurger, RevocationStore, StoreError},
    state::AppState,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info,auth_server=debug,tower_http=info";

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("revocation store: {0}")]
    Store(#[from] StoreError),

    #[error("user directory: {0}")]
    Directory(#[from] DirectoryError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        error!(error = %e, "Auth server failed");
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_span_events(span_events()),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_span_events(span_events()))
            .init(),
    }
}

async fn run(config: ServerConfig) -> Result<(), StartupError> {
    info!(config = ?config, "Starting auth server v{}", env!("CARGO_PKG_VERSION"));

    let directory: Arc<dyn UserDirectory> = match &config.users_file {
        Some(path) => {
            let directory = InMemoryUserDirectory::from_json_file(path)?;
            info!(users = directory.len(), path = %path.display(), "User directory loaded");
            Arc::new(directory)
        }
        None => {
            warn!("USERS_FILE not set, user directory is empty");
            Arc::new(InMemoryUserDirectory::default())
        }
    };

    let codec = TokenCodec::new(&config.jwt_secret);
    if !codec.can_sign() {
        warn!("JWT_SECRET not set, login is disabled and every bearer token is rejected");
    }

    let revocations = RevocationStore::open(&config.revocation_db_path)?;
    info!(path = %config.revocation_db_path.display(), "Revocation store opened");

    let state = AppState::new(
        codec,
        revocations.clone(),
        directory,
        config.invalid_token_policy,
    )
    .with_token_ttl(config.token_ttl);

    let shutdown = CancellationToken::new();
    let purger = RevocationPurger::new(revocations).with_interval(config.purge_interval);
    let purger_handle = tokio::spawn(purger.run(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Auth server listening (docs at /docs)");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown.cancel();
    if let Err(e) = purger_handle.await {
        warn!(error = %e, "Revocation purger task panicked");
    }

    info!("Auth server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
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
