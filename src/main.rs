//! Hx 3 status CLI.
//!
//! Connects to the account configured in `~/.config/hx3-client/`,
//! establishing or resuming a session, and prints the current state of
//! every thermostat found. Read-only; configuration is edited by hand or
//! entered through environment variables.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hx3_client::auth::CredentialStore;
use hx3_client::{Hx3Client, Hx3Config, SessionStore};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("hx3 status starting");

    let mut config = Hx3Config::load()?;
    if let Ok(email) = std::env::var("HX3_EMAIL") {
        config.email = email;
    }
    if let Ok(token) = std::env::var("HX3_TOKEN") {
        config.token = token;
    }
    // fall back to a share token stashed in the OS keychain
    if config.token.is_empty() && CredentialStore::has_share_token(&config.email) {
        config.token = CredentialStore::share_token(&config.email)?;
    }
    config.validate()?;

    let store = SessionStore::new(config.cache_dir()?);
    let saved = store.load().unwrap_or_default();
    let session = saved.or_else(|| config.seeded_session());

    let client = Arc::new(
        Hx3Client::new(config.credential(), session).context("Failed to build Hx client")?,
    );

    let session = client
        .connect()
        .await
        .context("Failed to sign in to the Hx 3 account - you may need a new share code")?;
    store.save(&session)?;
    config.record_session(&session);
    config.save()?;

    let locations = client.discover().await?;
    if locations.is_empty() {
        println!("No locations found on this account.");
        return Ok(());
    }

    for location in &locations {
        println!(
            "{} ({} {})",
            location.name,
            location.brand.as_deref().unwrap_or("Hx"),
            location.model.as_deref().unwrap_or("3"),
        );
        for controller in &location.controllers {
            let data = controller.data();
            let temp = data
                .indoor_temp
                .map(|t| format!("{:.1}°", t))
                .unwrap_or_else(|| "--".to_string());
            let humidity = data
                .humidity
                .map(|h| format!("{:.0}%", h))
                .unwrap_or_else(|| "--".to_string());
            println!(
                "  {:<20} {:>6}  rh {:>4}  mode {:<7} demand {:<5} heat {:.1}° cool {:.1}°  [{}]",
                controller.name(),
                temp,
                humidity,
                controller.system_mode(),
                data.active_demand(),
                controller.setpoint_heat(),
                controller.setpoint_cool(),
                if controller.is_alive() { "online" } else { "offline" },
            );
        }
    }

    if let Some(session) = client.manager().session().await {
        info!(
            valid_for_secs = session.seconds_until_expiry(Utc::now()),
            "session persisted"
        );
    }

    Ok(())
}
