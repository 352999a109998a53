//! Main entry point for the check-in backend.
//!
//! This file initializes the Axum web server, sets up database connections,
//! builds the credential codec and scanning registry, and registers all API
//! routes. `checkin staff-token <staff-id> [role]` prints a staff JWT instead
//! of serving.

mod api;
mod auth;
mod config;
mod credentials;
mod database;
mod errors;
mod repositories;
mod services;
mod utils;

use anyhow::{Context, Result, bail};
use api::AppContext;
use config::Config;
use credentials::TokenCodec;
use database::Database;
use repositories::event_repository::EventRepository;
use repositories::guest_repository::GuestRepository;
use services::checkin::{ScanSessionRegistry, ScanSettings};
use services::credential_service::CredentialService;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utils::clock::SystemClock;
use utils::jwt::JwtUtils;

/// Lifetime of tokens minted with `staff-token`.
const STAFF_TOKEN_HOURS: i64 = 12;

/// How often abandoned scan sessions are looked for.
const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let jwt = Arc::new(JwtUtils::new(&config.jwt_secret));

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(command) = args.first() {
        return match command.as_str() {
            "staff-token" => print_staff_token(&jwt, &args[1..]),
            other => bail!("unknown command '{}'", other),
        };
    }

    let db = Database::new(&config).await?;
    let pool = db.pool().clone();

    let codec = Arc::new(TokenCodec::new(&config.crypto).context("invalid credential keys")?);
    let guests = Arc::new(GuestRepository::new(pool.clone()));
    let events = Arc::new(EventRepository::new(pool.clone()));
    let clock = Arc::new(SystemClock);

    let settings = ScanSettings {
        cooldown: config.scan_cooldown(),
        history_limit: config.scan_history_limit,
        idle_timeout: config.scan_session_idle_timeout(),
    };
    let scans = Arc::new(ScanSessionRegistry::new(
        codec.clone(),
        guests.clone(),
        events,
        clock.clone(),
        settings,
    ));
    tokio::spawn(sweep_idle_sessions(scans.clone()));

    let app = api::app(AppContext {
        pool,
        jwt,
        credentials: Arc::new(CredentialService::new(codec, guests, clock)),
        scans,
    });

    let bind_address = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;

    info!("Starting check-in server on port {}", config.server_port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    Ok(())
}

fn print_staff_token(jwt: &JwtUtils, args: &[String]) -> Result<()> {
    let Some(staff_id) = args.first() else {
        bail!("usage: checkin staff-token <staff-id> [role]");
    };
    let role = args.get(1).map(String::as_str).unwrap_or("scanner");

    let token = jwt.generate_token(
        staff_id.as_str(),
        role,
        chrono::Duration::hours(STAFF_TOKEN_HOURS),
    )?;
    println!("{}", token);
    Ok(())
}

async fn sweep_idle_sessions(scans: Arc<ScanSessionRegistry>) {
    let mut ticker = tokio::time::interval(IDLE_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        let expired = scans.expire_idle();
        if expired > 0 {
            info!(expired, active = scans.active_sessions(), "idle scan sessions swept");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
