//! Polled update loop for discovered devices.
//!
//! The host environment owns the timer; `Hx3Data::update` is called from
//! it and does the rest: throttling, per-device refresh with a pause
//! between API calls, bounded retries on transient failures, and session
//! persistence so freshly rotated tokens survive a restart.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, Controller, Hx3Client, Location};
use crate::auth::SessionStore;

/// Pause between per-device API calls within one update pass
const UPDATE_LOOP_SLEEP_SECS: u64 = 5;

/// Minimum interval between full update passes
const MIN_TIME_BETWEEN_UPDATES_SECS: i64 = 300;

/// Attempts per update pass before the error is surfaced
const MAX_UPDATE_RETRIES: u32 = 3;

/// Holds the discovered controllers and keeps them fresh.
pub struct Hx3Data {
    client: Arc<Hx3Client>,
    session_store: SessionStore,
    pub locations: Vec<Location>,
    last_update: Option<DateTime<Utc>>,
}

impl Hx3Data {
    /// Discover the account's devices and build the update state.
    pub async fn new(client: Arc<Hx3Client>, session_store: SessionStore) -> Result<Self, ApiError> {
        let locations = client.discover().await?;
        let count: usize = locations.iter().map(|l| l.controllers.len()).sum();
        if count == 0 {
            warn!("no controllers found on account");
        } else {
            info!(controllers = count, "discovered devices");
        }
        Ok(Self {
            client,
            session_store,
            locations,
            last_update: None,
        })
    }

    pub fn controllers(&self) -> impl Iterator<Item = &Controller> + '_ {
        self.locations.iter().flat_map(|l| l.controllers.iter())
    }

    fn controllers_mut(&mut self) -> impl Iterator<Item = &mut Controller> + '_ {
        self.locations.iter_mut().flat_map(|l| l.controllers.iter_mut())
    }

    /// Refresh every controller, at most once per throttle interval.
    ///
    /// Transient errors are retried up to the attempt limit; terminal
    /// errors (including a revoked refresh token) surface immediately.
    pub async fn update(&mut self) -> Result<(), ApiError> {
        if !update_due(self.last_update, Utc::now()) {
            debug!("update throttled");
            return Ok(());
        }

        let mut attempts = 0;
        loop {
            match self.refresh_devices().await {
                Ok(()) => break,
                Err(err) => {
                    attempts += 1;
                    if !should_retry(&err, attempts) {
                        error!(error = %err, "update failed after {} attempts", attempts);
                        return Err(err);
                    }
                    warn!(error = %err, attempt = attempts, "update failed, retrying");
                }
            }
        }

        self.last_update = Some(Utc::now());

        // rotated tokens must survive a restart
        if let Some(session) = self.client.manager().session().await {
            if let Err(err) = self.session_store.save(&session) {
                warn!(error = %err, "failed to persist session");
            }
        }
        Ok(())
    }

    async fn refresh_devices(&mut self) -> Result<(), ApiError> {
        let mut first = true;
        for controller in self.controllers_mut() {
            if !first {
                sleep(std::time::Duration::from_secs(UPDATE_LOOP_SLEEP_SECS)).await;
            }
            first = false;
            controller.refresh().await?;
        }
        Ok(())
    }
}

/// Whether enough time has passed since the previous pass for a new one.
fn update_due(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_update {
        Some(last) => now - last >= Duration::seconds(MIN_TIME_BETWEEN_UPDATES_SECS),
        None => true,
    }
}

/// Whether a failed pass gets another attempt. Only transient errors are
/// retried, and only while the attempt budget lasts.
fn should_retry(err: &ApiError, attempts: u32) -> bool {
    err.is_transient() && attempts < MAX_UPDATE_RETRIES
}
