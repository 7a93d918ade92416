//! Client library for Hx 3 smart thermostats.
//!
//! Access to an Hx 3 account is delegated through a one-time share code
//! generated from the vendor's mobile app. This crate exchanges that code
//! for an access/refresh token pair, keeps the pair fresh, and exposes
//! the cloud API on top of it: location and controller discovery, state
//! reads, and mode/fan/setpoint/away changes.
//!
//! The share code is single-use and expires after about a week, so the
//! established session is persisted and resumed across restarts; only a
//! rejected refresh token sends the user back to the mobile app.

pub mod api;
pub mod auth;
pub mod config;
pub mod coordinator;
pub mod models;

pub use api::{ApiError, AuthError, Controller, Hx3Client, Location};
pub use auth::{
    AuthState, AuthTransport, Credential, CredentialStore, SessionData, SessionStore, TokenGrant,
    TokenManager,
};
pub use config::Hx3Config;
pub use coordinator::Hx3Data;
