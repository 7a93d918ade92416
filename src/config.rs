//! Application configuration management.
//!
//! The configuration carries exactly what the user enters from the share
//! message (email + one-time token) plus an optional pre-seeded session:
//! access/refresh tokens, TTL, and the last refresh timestamp. A TTL of
//! zero means the seeded session is unknown and a fresh exchange is
//! forced.
//!
//! Configuration is stored at `~/.config/hx3-client/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::auth::{Credential, SessionData};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "hx3-client";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Hx3Config {
    /// Account email from the share message
    pub email: String,
    /// One-time share token from the share message
    pub token: String,
    /// Pre-seeded session value; normally left blank
    #[serde(default)]
    pub access_token: String,
    /// Pre-seeded session value; normally left blank
    #[serde(default)]
    pub refresh_token: String,
    /// Seconds until expiry; 0 means unknown, force exchange
    #[serde(default)]
    pub ttl: u64,
    /// Epoch seconds of last successful refresh
    #[serde(default)]
    pub last_refresh: i64,
}

impl Hx3Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Check the field contract: a credential is required unless a full
    /// session has been pre-seeded.
    pub fn validate(&self) -> Result<()> {
        if self.seeded_session().is_some() {
            return Ok(());
        }
        if self.email.is_empty() || !self.email.contains('@') {
            anyhow::bail!("A valid account email is required");
        }
        if self.token.is_empty() {
            anyhow::bail!("A share token (or a pre-seeded access token) is required");
        }
        Ok(())
    }

    /// The session pre-seeded in config, if it is established.
    /// `ttl == 0` marks an unknown session and yields None.
    pub fn seeded_session(&self) -> Option<SessionData> {
        if self.access_token.is_empty() || self.refresh_token.is_empty() || self.ttl == 0 {
            return None;
        }
        let last_refresh = DateTime::from_timestamp(self.last_refresh, 0)?;
        Some(SessionData {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            ttl: self.ttl,
            last_refresh,
        })
    }

    pub fn credential(&self) -> Credential {
        Credential {
            email: self.email.clone(),
            share_token: self.token.clone(),
        }
    }

    /// Write the current session back into the config fields, the way the
    /// tokens were originally round-tripped through host configuration.
    pub fn record_session(&mut self, session: &SessionData) {
        self.access_token = session.access_token.clone();
        self.refresh_token = session.refresh_token.clone();
        self.ttl = session.ttl;
        self.last_refresh = session.last_refresh.timestamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_email_and_token() {
        let config = Hx3Config::default();
        assert!(config.validate().is_err());

        let config = Hx3Config {
            email: "a@example.com".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Hx3Config {
            email: "a@example.com".into(),
            token: "abc123".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_email() {
        let config = Hx3Config {
            email: "not-an-email".into(),
            token: "abc123".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seeded_session_allows_blank_credential() {
        let config = Hx3Config {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            ttl: 604_800,
            last_refresh: 1_700_000_000,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        let session = config.seeded_session().unwrap();
        assert_eq!(session.ttl, 604_800);
        assert_eq!(session.last_refresh.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_zero_ttl_forces_exchange() {
        // ttl 0 means "unknown" even with tokens present
        let config = Hx3Config {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            ttl: 0,
            last_refresh: 1_700_000_000,
            ..Default::default()
        };
        assert!(config.seeded_session().is_none());
    }

    #[test]
    fn test_record_session_roundtrip() {
        let mut config = Hx3Config {
            email: "a@example.com".into(),
            token: "abc123".into(),
            ..Default::default()
        };
        let session = SessionData {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            ttl: 3600,
            last_refresh: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        config.record_session(&session);
        let back = config.seeded_session().unwrap();
        assert_eq!(back.access_token, "access");
        assert_eq!(back.ttl, 3600);
        assert_eq!(back.last_refresh, session.last_refresh);
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let path = PathBuf::from("/nonexistent/hx3/config.json");
        let config = Hx3Config::load_from(&path).unwrap();
        assert!(config.email.is_empty());
        assert_eq!(config.ttl, 0);
    }
}
