//! Token lifecycle management.
//!
//! The `TokenManager` owns the single session for a configured account and
//! drives it through exchange and refresh. The vendor API sits behind the
//! `AuthTransport` trait so the lifecycle logic is testable without a
//! network.

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::error::AuthError;
use crate::auth::session::SessionData;

/// The account credential entered by the user: email plus the one-time
/// share token from the share message. Consumed by a successful exchange.
#[derive(Debug, Clone)]
pub struct Credential {
    pub email: String,
    pub share_token: String,
}

/// A token pair as returned by the vendor on sign-in or refresh.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub ttl: u64,
    /// "F" or "C", only present on sign-in
    pub temperature_unit: Option<String>,
}

/// Network side of the lifecycle. The real implementation is the GraphQL
/// transport; tests use a scripted mock.
#[allow(async_fn_in_trait)]
pub trait AuthTransport {
    /// Exchange (email, share_token) for a token pair.
    async fn sign_in(&self, email: &str, share_token: &str) -> Result<TokenGrant, AuthError>;

    /// Trade the refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError>;
}

impl<T: AuthTransport> AuthTransport for std::sync::Arc<T> {
    async fn sign_in(&self, email: &str, share_token: &str) -> Result<TokenGrant, AuthError> {
        (**self).sign_in(email, share_token).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        (**self).refresh(refresh_token).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No established session; the credential must be exchanged.
    Unauthenticated,
    /// A session exists and its refresh token is believed good.
    Authenticated,
    /// A refresh call is in flight.
    Refreshing,
    /// The refresh token was rejected. Only a fresh credential recovers.
    Expired,
}

struct Inner {
    state: AuthState,
    session: Option<SessionData>,
    credential: Credential,
}

/// Owns the account session and serializes all mutation of it.
///
/// All state lives behind one async mutex which is held across the
/// exchange/refresh network call, so at most one refresh is ever in
/// flight for the session. Readers get snapshots via [`session`].
///
/// [`session`]: TokenManager::session
pub struct TokenManager<T> {
    transport: T,
    inner: Mutex<Inner>,
}

impl<T: AuthTransport> TokenManager<T> {
    pub fn new(transport: T, credential: Credential) -> Self {
        Self {
            transport,
            inner: Mutex::new(Inner {
                state: AuthState::Unauthenticated,
                session: None,
                credential,
            }),
        }
    }

    /// Resume from a persisted session. A session with `ttl == 0` is
    /// unestablished and treated as no session at all; an expired one is
    /// kept, since its refresh token usually still works.
    pub fn with_session(transport: T, credential: Credential, session: SessionData) -> Self {
        let (state, session) = if session.ttl == 0 {
            (AuthState::Unauthenticated, None)
        } else {
            (AuthState::Authenticated, Some(session))
        };
        Self {
            transport,
            inner: Mutex::new(Inner {
                state,
                session,
                credential,
            }),
        }
    }

    pub async fn state(&self) -> AuthState {
        self.inner.lock().await.state
    }

    /// Snapshot of the current session, if one is established.
    pub async fn session(&self) -> Option<SessionData> {
        self.inner.lock().await.session.clone()
    }

    /// Replace the credential with a freshly generated share code.
    /// This is the only way out of `Expired`.
    pub async fn set_credential(&self, credential: Credential) {
        let mut inner = self.inner.lock().await;
        inner.credential = credential;
        if inner.state == AuthState::Expired {
            inner.state = AuthState::Unauthenticated;
            inner.session = None;
        }
    }

    /// Exchange the configured (email, share_token) for a session.
    ///
    /// The share token is single-use: a second exchange with the same
    /// token fails with `ExpiredShareToken` on the vendor side.
    pub async fn exchange(&self) -> Result<SessionData, AuthError> {
        let mut inner = self.inner.lock().await;
        self.exchange_locked(&mut inner).await
    }

    async fn exchange_locked(&self, inner: &mut Inner) -> Result<SessionData, AuthError> {
        let credential = inner.credential.clone();
        debug!(email = %credential.email, "exchanging share token for session");
        match self
            .transport
            .sign_in(&credential.email, &credential.share_token)
            .await
        {
            Ok(grant) => {
                let session = SessionData::from_grant(&grant, Utc::now());
                info!(ttl = session.ttl, "session established");
                inner.session = Some(session.clone());
                inner.state = AuthState::Authenticated;
                Ok(session)
            }
            Err(err) => {
                warn!(error = %err, "share token exchange failed");
                Err(err)
            }
        }
    }

    /// Refresh the current session in place.
    ///
    /// Once the refresh token has been rejected the manager is `Expired`
    /// and further calls fail fast with `RevokedRefreshToken` without
    /// touching the network.
    pub async fn refresh(&self) -> Result<SessionData, AuthError> {
        let mut inner = self.inner.lock().await;
        self.refresh_locked(&mut inner).await
    }

    async fn refresh_locked(&self, inner: &mut Inner) -> Result<SessionData, AuthError> {
        if inner.state == AuthState::Expired {
            return Err(AuthError::RevokedRefreshToken);
        }
        let previous = inner
            .session
            .clone()
            .ok_or_else(|| AuthError::InvalidCredential("no established session to refresh".into()))?;
        inner.state = AuthState::Refreshing;
        debug!("refreshing access token");
        match self.transport.refresh(&previous.refresh_token).await {
            Ok(grant) => {
                let mut session = SessionData::from_grant(&grant, Utc::now());
                // last_refresh must advance strictly across a refresh
                if session.last_refresh <= previous.last_refresh {
                    session.last_refresh = previous.last_refresh + Duration::milliseconds(1);
                }
                debug!(ttl = session.ttl, "access token refreshed");
                inner.session = Some(session.clone());
                inner.state = AuthState::Authenticated;
                Ok(session)
            }
            Err(err) => {
                if err.is_terminal() {
                    warn!(error = %err, "refresh token rejected, session expired");
                    inner.state = AuthState::Expired;
                } else {
                    // transient; the session is unchanged and may be retried
                    warn!(error = %err, "refresh failed transiently");
                    inner.state = AuthState::Authenticated;
                }
                Err(err)
            }
        }
    }

    /// Return an established, non-stale session, exchanging or refreshing
    /// as needed. Fails fast when `Expired`.
    ///
    /// The state check and any follow-up exchange or refresh happen under
    /// one lock acquisition, so concurrent callers cannot both observe
    /// `Unauthenticated` and burn the single-use share token twice: the
    /// second caller blocks and then sees the fresh session.
    pub async fn ensure_session(&self) -> Result<SessionData, AuthError> {
        let mut inner = self.inner.lock().await;
        if let (AuthState::Authenticated, Some(session)) = (inner.state, &inner.session) {
            if !session.needs_refresh(Utc::now()) {
                return Ok(session.clone());
            }
        }
        match inner.state {
            AuthState::Expired => Err(AuthError::RevokedRefreshToken),
            AuthState::Unauthenticated => self.exchange_locked(&mut inner).await,
            _ => self.refresh_locked(&mut inner).await,
        }
    }

    /// Bearer token for an authenticated call, refreshed if stale.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.ensure_session().await?.access_token)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use super::*;

    #[derive(Default)]
    struct MockTransport {
        sign_in_results: StdMutex<VecDeque<Result<TokenGrant, AuthError>>>,
        refresh_results: StdMutex<VecDeque<Result<TokenGrant, AuthError>>>,
        sign_in_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
    }

    impl MockTransport {
        fn on_sign_in(self, result: Result<TokenGrant, AuthError>) -> Self {
            self.sign_in_results.lock().unwrap().push_back(result);
            self
        }

        fn on_refresh(self, result: Result<TokenGrant, AuthError>) -> Self {
            self.refresh_results.lock().unwrap().push_back(result);
            self
        }
    }

    impl AuthTransport for MockTransport {
        async fn sign_in(&self, _email: &str, _token: &str) -> Result<TokenGrant, AuthError> {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            self.sign_in_results
                .lock()
                .unwrap()
                .pop_front()
                // a consumed share token fails every later exchange
                .unwrap_or(Err(AuthError::ExpiredShareToken))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, AuthError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AuthError::RevokedRefreshToken))
        }
    }

    fn grant(access: &str, ttl: u64) -> TokenGrant {
        TokenGrant {
            access_token: access.into(),
            refresh_token: format!("{}-refresh", access),
            ttl,
            temperature_unit: Some("F".into()),
        }
    }

    fn credential() -> Credential {
        Credential {
            email: "a@example.com".into(),
            share_token: "abc123".into(),
        }
    }

    #[tokio::test]
    async fn test_exchange_establishes_session() {
        let transport = MockTransport::default().on_sign_in(Ok(grant("t1", 604_800)));
        let manager = TokenManager::new(transport, credential());
        assert_eq!(manager.state().await, AuthState::Unauthenticated);

        let before = Utc::now();
        let session = manager.exchange().await.unwrap();
        assert!(session.ttl > 0);
        assert_eq!(session.access_token, "t1");
        // last_refresh == now within clock tolerance
        assert!((session.last_refresh - before).num_seconds().abs() <= 5);
        assert_eq!(manager.state().await, AuthState::Authenticated);
    }

    #[tokio::test]
    async fn test_second_exchange_with_consumed_token_fails() {
        let transport = MockTransport::default().on_sign_in(Ok(grant("t1", 3600)));
        let manager = TokenManager::new(transport, credential());

        manager.exchange().await.unwrap();
        let err = manager.exchange().await.unwrap_err();
        assert!(matches!(err, AuthError::ExpiredShareToken));
    }

    #[tokio::test]
    async fn test_refresh_updates_session_monotonically() {
        let transport = MockTransport::default()
            .on_sign_in(Ok(grant("t1", 3600)))
            .on_refresh(Ok(grant("t2", 3600)));
        let manager = TokenManager::new(transport, credential());

        let first = manager.exchange().await.unwrap();
        let second = manager.refresh().await.unwrap();
        assert_eq!(second.access_token, "t2");
        assert_eq!(second.refresh_token, "t2-refresh");
        assert!(second.last_refresh > first.last_refresh);
        assert_eq!(manager.state().await, AuthState::Authenticated);
    }

    #[tokio::test]
    async fn test_revoked_refresh_is_terminal_and_fails_fast() {
        let transport = MockTransport::default()
            .on_sign_in(Ok(grant("t1", 3600)))
            .on_refresh(Err(AuthError::RevokedRefreshToken));
        let manager = TokenManager::new(transport, credential());

        manager.exchange().await.unwrap();
        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::RevokedRefreshToken));
        assert_eq!(manager.state().await, AuthState::Expired);

        // subsequent refreshes fail identically with no network call
        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::RevokedRefreshToken));
        assert_eq!(manager.transport.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_network_failure_is_not_terminal() {
        let transport = MockTransport::default()
            .on_sign_in(Ok(grant("t1", 3600)))
            .on_refresh(Err(AuthError::NetworkFailure("timeout".into())))
            .on_refresh(Ok(grant("t2", 3600)));
        let manager = TokenManager::new(transport, credential());

        manager.exchange().await.unwrap();
        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkFailure(_)));
        assert_eq!(manager.state().await, AuthState::Authenticated);

        // retry succeeds against the same refresh token
        let session = manager.refresh().await.unwrap();
        assert_eq!(session.access_token, "t2");
        assert_eq!(manager.transport.refresh_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ensure_session_skips_refresh_while_fresh() {
        let transport = MockTransport::default().on_sign_in(Ok(grant("t1", 604_800)));
        let manager = TokenManager::new(transport, credential());

        manager.exchange().await.unwrap();
        let session = manager.ensure_session().await.unwrap();
        assert_eq!(session.access_token, "t1");
        assert_eq!(manager.transport.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ensure_session_refreshes_stale_session() {
        let stale = SessionData {
            access_token: "old".into(),
            refresh_token: "old-refresh".into(),
            ttl: 604_800,
            last_refresh: Utc::now() - Duration::seconds(604_801),
        };
        assert!(!stale.is_valid(Utc::now()));

        let transport = MockTransport::default().on_refresh(Ok(grant("t2", 604_800)));
        let manager = TokenManager::with_session(transport, credential(), stale);

        let session = manager.ensure_session().await.unwrap();
        assert_eq!(session.access_token, "t2");
        assert_eq!(manager.transport.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.transport.sign_in_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unestablished_session_forces_exchange() {
        let seeded = SessionData {
            access_token: String::new(),
            refresh_token: String::new(),
            ttl: 0,
            last_refresh: Utc::now(),
        };
        let transport = MockTransport::default().on_sign_in(Ok(grant("t1", 3600)));
        let manager = TokenManager::with_session(transport, credential(), seeded);
        assert_eq!(manager.state().await, AuthState::Unauthenticated);

        let session = manager.ensure_session().await.unwrap();
        assert_eq!(session.access_token, "t1");
        assert_eq!(manager.transport.sign_in_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_session_exchanges_once() {
        let transport = MockTransport::default().on_sign_in(Ok(grant("t1", 604_800)));
        let manager = TokenManager::new(transport, credential());

        // both callers race the first exchange; the share token is
        // single-use, so exactly one sign-in may go out
        let (a, b) = tokio::join!(manager.ensure_session(), manager.ensure_session());
        assert_eq!(a.unwrap().access_token, "t1");
        assert_eq!(b.unwrap().access_token, "t1");
        assert_eq!(manager.transport.sign_in_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ensure_session_fails_fast_when_expired() {
        let transport = MockTransport::default()
            .on_sign_in(Ok(grant("t1", 3600)))
            .on_refresh(Err(AuthError::RevokedRefreshToken));
        let manager = TokenManager::new(transport, credential());

        manager.exchange().await.unwrap();
        let _ = manager.refresh().await;
        assert_eq!(manager.state().await, AuthState::Expired);

        let err = manager.ensure_session().await.unwrap_err();
        assert!(matches!(err, AuthError::RevokedRefreshToken));
        assert_eq!(manager.transport.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_new_credential_recovers_from_expired() {
        let transport = MockTransport::default()
            .on_sign_in(Ok(grant("t1", 3600)))
            .on_refresh(Err(AuthError::RevokedRefreshToken))
            .on_sign_in(Ok(grant("t2", 3600)));
        let manager = TokenManager::new(transport, credential());

        manager.exchange().await.unwrap();
        let _ = manager.refresh().await;
        assert_eq!(manager.state().await, AuthState::Expired);

        manager
            .set_credential(Credential {
                email: "a@example.com".into(),
                share_token: "def456".into(),
            })
            .await;
        assert_eq!(manager.state().await, AuthState::Unauthenticated);

        let session = manager.exchange().await.unwrap();
        assert_eq!(session.access_token, "t2");
        assert_eq!(manager.state().await, AuthState::Authenticated);
    }
}
