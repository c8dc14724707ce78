//! # account-api
//!
//! User account HTTP service in Rust.
//!
//! Serves registration, lookup, profile update, password change, and an
//! email-existence check as JSON over HTTP.
//!
//! ## Architecture
//!
//! - **HTTP**: Axum router with rate limiting, request IDs, tracing, and graceful shutdown
//! - **Validation**: Synchronous signup and profile checks that collect every error
//! - **User service**: Async trait owning persistence, hashing, and email uniqueness
//! - **Store**: In-memory service with Argon2id hashes and atomic email claims
//! - **Seed file**: Optional TOML list of accounts registered at startup

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod config;
mod http;
mod password;
mod seed;
mod store;
mod user;
mod validation;

use std::sync::Arc;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Cli};
use crate::http::{router, AppState};
use crate::seed::seed_users;
use crate::store::InMemoryUserService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    info!(
        bind = %config.bind,
        mode = %config.mode,
        seed_file = ?config.seed_file.as_ref().map(|path| path.display().to_string()),
        "configuration loaded"
    );

    let users = InMemoryUserService::new();
    if let Some(seed_path) = config.seed_file.as_deref() {
        let created = seed_users(seed_path, &users)
            .await
            .with_context(|| format!("failed to seed users from {}", seed_path.display()))?;
        info!(
            created,
            total = users.user_count(),
            path = %seed_path.display(),
            "seed users registered"
        );
    }

    let state = AppState::new(Arc::new(users));

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    if config.bind.ip().is_loopback() {
        tracing::warn!(
            bind = %config.bind,
            "binding to loopback; use --bind 0.0.0.0:3000 for LAN access"
        );
    }

    let shutdown = tokio::signal::ctrl_c();
    info!(
        bind = %config.bind,
        "server running in {} mode on port {}",
        config.mode,
        config.bind.port()
    );

    serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
            info!("shutting down gracefully");
        })
        .await
        .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
