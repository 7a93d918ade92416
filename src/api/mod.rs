//! GraphQL API client for the Hx cloud service.
//!
//! This module provides the `Hx3Client` for communicating with the
//! vendor's cloud API: session sign-in and refresh, location and
//! controller discovery, state reads, and state-change mutations.
//!
//! The API uses bearer access tokens obtained by exchanging a one-time
//! share code; see the `auth` module for the token lifecycle.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{Controller, Hx3Client, Location};
pub use error::{ApiError, AuthError};
pub use transport::GraphqlTransport;
