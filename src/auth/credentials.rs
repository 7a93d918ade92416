use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "hx3-client";

/// OS keychain storage for the one-time share token, keyed by account
/// email, so it never has to sit in a plain-text config file.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the share token for an account in the OS keychain
    pub fn store(email: &str, share_token: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(share_token)
            .context("Failed to store share token in keychain")?;
        Ok(())
    }

    /// Retrieve the share token for an account from the OS keychain
    pub fn share_token(email: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve share token from keychain")
    }

    /// Check if a share token is stored for an account
    pub fn has_share_token(email: &str) -> bool {
        if let Ok(entry) = Entry::new(SERVICE_NAME, email) {
            entry.get_password().is_ok()
        } else {
            false
        }
    }
}
