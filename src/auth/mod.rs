//! Authentication module for the Hx 3 token lifecycle.
//!
//! This module provides:
//! - `TokenManager`: the session state machine (exchange, proactive
//!   refresh, terminal expiry)
//! - `SessionData` / `SessionStore`: the token pair and its persistence
//! - `CredentialStore`: OS-level share token storage via keyring
//!
//! The one-time share token is single-use and expires after about a
//! week; the session it buys lives on through the refresh token.

pub mod credentials;
pub mod manager;
pub mod session;

pub use credentials::CredentialStore;
pub use manager::{AuthState, AuthTransport, Credential, TokenGrant, TokenManager};
pub use session::{SessionData, SessionStore, REFRESH_MARGIN_SECS};
