use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::manager::TokenGrant;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Remaining lifetime below which the access token is refreshed
/// proactively, rather than waiting for it to expire mid-request.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// An established token pair plus its expiry bookkeeping.
///
/// Created by exchanging a one-time share code, mutated in place on each
/// refresh cycle. The access token is valid until `last_refresh + ttl`;
/// the refresh token outlives it and is what keeps the session alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub ttl: u64,
    pub last_refresh: DateTime<Utc>,
}

impl SessionData {
    pub fn from_grant(grant: &TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
            ttl: grant.ttl,
            last_refresh: now,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.last_refresh + Duration::seconds(self.ttl as i64)
    }

    /// Whether the access token can still be used at `now`.
    /// Pure function: callers check this before making authenticated calls.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }

    /// Whether the session should be refreshed now, ahead of actual expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() - now < Duration::seconds(REFRESH_MARGIN_SECS)
    }

    /// Seconds remaining until expiry (for display), clamped at zero.
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at() - now).num_seconds().max(0)
    }
}

/// Disk persistence for the session, so restarting does not burn the
/// one-time share code.
pub struct SessionStore {
    cache_dir: PathBuf,
}

impl SessionStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load the saved session, if any. An expired session is still
    /// returned: its refresh token is usually still good.
    pub fn load(&self) -> Result<Option<SessionData>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data))
    }

    /// Save session to disk
    pub fn save(&self, data: &SessionData) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Remove the saved session
    pub fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(ttl: u64, last_refresh: DateTime<Utc>) -> SessionData {
        SessionData {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            ttl,
            last_refresh,
        }
    }

    #[test]
    fn test_is_valid_within_ttl() {
        let t0 = Utc::now();
        let s = session(604_800, t0);
        assert!(s.is_valid(t0));
        assert!(s.is_valid(t0 + Duration::seconds(604_799)));
    }

    #[test]
    fn test_is_valid_at_and_past_expiry() {
        let t0 = Utc::now();
        let s = session(604_800, t0);
        // now == last_refresh + ttl is already expired
        assert!(!s.is_valid(t0 + Duration::seconds(604_800)));
        assert!(!s.is_valid(t0 + Duration::seconds(604_801)));
    }

    #[test]
    fn test_unestablished_session_is_never_valid() {
        let t0 = Utc::now();
        let s = session(0, t0);
        assert!(!s.is_valid(t0));
    }

    #[test]
    fn test_needs_refresh_margin() {
        let t0 = Utc::now();
        let s = session(3600, t0);
        assert!(!s.needs_refresh(t0));
        assert!(!s.needs_refresh(t0 + Duration::seconds(3600 - REFRESH_MARGIN_SECS)));
        assert!(s.needs_refresh(t0 + Duration::seconds(3600 - REFRESH_MARGIN_SECS + 1)));
        assert!(s.needs_refresh(t0 + Duration::seconds(3601)));
    }

    #[test]
    fn test_seconds_until_expiry_clamps_at_zero() {
        let t0 = Utc::now();
        let s = session(60, t0);
        assert_eq!(s.seconds_until_expiry(t0), 60);
        assert_eq!(s.seconds_until_expiry(t0 + Duration::seconds(120)), 0);
    }

    #[test]
    fn test_session_roundtrip() {
        let s = session(604_800, Utc::now());
        let json = serde_json::to_string(&s).unwrap();
        let back: SessionData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.access_token, s.access_token);
        assert_eq!(back.refresh_token, s.refresh_token);
        assert_eq!(back.ttl, s.ttl);
        assert_eq!(back.last_refresh, s.last_refresh);
    }
}
