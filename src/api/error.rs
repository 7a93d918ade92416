use thiserror::Error;

/// Errors from the token lifecycle.
///
/// Everything except `NetworkFailure` is terminal for the current session:
/// the user has to generate a new share code from the mobile app and
/// re-enter it.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("share token rejected - it has expired or was already used")]
    ExpiredShareToken,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("refresh token revoked - re-authentication required")]
    RevokedRefreshToken,

    #[error("network failure: {0}")]
    NetworkFailure(String),
}

impl AuthError {
    /// Whether this error invalidates the session.
    /// `NetworkFailure` is transient and may be retried with backoff.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuthError::NetworkFailure(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::NetworkFailure(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unauthorized - access token may be expired")]
    Unauthorized,

    #[error("rate limited - please wait before retrying")]
    RateLimited,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not supported by this device: {0}")]
    NotSupported(String),

    #[error("rejected while away or vacation mode is active: {0}")]
    ModeLocked(String),

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error: {0}")]
    Api(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Whether a polling caller may retry this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited
                | ApiError::Network(_)
                | ApiError::ServerError(_)
                | ApiError::Auth(AuthError::NetworkFailure(_))
        )
    }
}
