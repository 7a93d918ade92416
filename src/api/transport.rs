//! GraphQL transport for the Hx cloud API.
//!
//! The API is GraphQL over HTTPS POST: a JSON body of `{query, variables}`
//! with a bearer access token. Auth mutations return union types, so the
//! queries request `__typename` on the error fragments to let us map them
//! onto the error taxonomy.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::error::{ApiError, AuthError};
use crate::auth::manager::{AuthTransport, TokenGrant};

/// Vendor API endpoint
const DEFAULT_ENDPOINT: &str = "https://hx-thermostat.herokuapp.com";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

pub(crate) const SIGN_IN_MUTATION: &str = "\
mutation signIn($input: SignInInput!) {
  signIn(input: $input) {
    ... on SignInSuccess {
      accessToken
      refreshToken
      ttl
      user {
        temperatureUnit
      }
    }
    ... on TokenInvalid {
      __typename
      message
    }
    ... on EmailInvalid {
      __typename
      message
    }
  }
}";

pub(crate) const REFRESH_MUTATION: &str = "\
mutation refreshToken($input: RefreshTokenInput!) {
  refreshToken(input: $input) {
    ... on RefreshTokenSuccess {
      accessToken
      refreshToken
      ttl
    }
    ... on TokenInvalid {
      __typename
      message
    }
  }
}";

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphqlErrorEntry>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlErrorEntry {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphqlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

/// GraphQL-over-HTTP transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct GraphqlTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl GraphqlTransport {
    pub fn new() -> Result<Self, ApiError> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Execute a query or mutation, returning the `data` payload.
    ///
    /// HTTP 429 is retried with exponential backoff; GraphQL-level errors
    /// are mapped via [`classify_graphql_errors`].
    pub async fn execute(
        &self,
        token: Option<&str>,
        query: &str,
        variables: Value,
    ) -> Result<Value, ApiError> {
        let body = json!({
            "query": query,
            "variables": variables,
        });

        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.post(&self.endpoint).json(&body);
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ApiError::from_status(status, &text));
            }

            let parsed: GraphqlResponse = response.json().await?;

            if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
                return Err(classify_graphql_errors(&errors));
            }

            debug!("GraphQL response received");
            return parsed
                .data
                .ok_or_else(|| ApiError::InvalidResponse("response carried no data".into()));
        }
    }
}

/// Map GraphQL error entries onto the API error taxonomy.
/// An UNAUTHENTICATED code means the access token was not accepted.
pub(crate) fn classify_graphql_errors(errors: &[GraphqlErrorEntry]) -> ApiError {
    let unauthenticated = errors.iter().any(|e| {
        e.extensions
            .as_ref()
            .and_then(|x| x.code.as_deref())
            .map(|code| code == "UNAUTHENTICATED")
            .unwrap_or(false)
            || e.message.contains("UNAUTHENTICATED")
    });
    if unauthenticated {
        return ApiError::Unauthorized;
    }
    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    ApiError::Api(messages.join("; "))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantPayload {
    access_token: String,
    refresh_token: String,
    ttl: u64,
    #[serde(default)]
    user: Option<GrantUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantUser {
    #[serde(default)]
    temperature_unit: Option<String>,
}

/// Parse the `signIn` union payload into a grant or an auth error.
pub(crate) fn parse_sign_in(payload: &Value) -> Result<TokenGrant, AuthError> {
    parse_grant(payload, |typename, message| match typename {
        "TokenInvalid" => AuthError::ExpiredShareToken,
        _ => AuthError::InvalidCredential(message.to_string()),
    })
}

/// Parse the `refreshToken` union payload into a grant or an auth error.
pub(crate) fn parse_refresh(payload: &Value) -> Result<TokenGrant, AuthError> {
    parse_grant(payload, |_, _| AuthError::RevokedRefreshToken)
}

fn parse_grant(
    payload: &Value,
    classify: impl Fn(&str, &str) -> AuthError,
) -> Result<TokenGrant, AuthError> {
    if let Some(message) = payload.get("message").and_then(|m| m.as_str()) {
        let typename = payload
            .get("__typename")
            .and_then(|t| t.as_str())
            .unwrap_or("");
        return Err(classify(typename, message));
    }
    let grant: GrantPayload = serde_json::from_value(payload.clone())
        .map_err(|e| AuthError::NetworkFailure(format!("malformed token response: {}", e)))?;
    Ok(TokenGrant {
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        ttl: grant.ttl,
        temperature_unit: grant.user.and_then(|u| u.temperature_unit),
    })
}

fn transport_auth_err(err: ApiError) -> AuthError {
    match err {
        ApiError::Auth(auth) => auth,
        other => AuthError::NetworkFailure(other.to_string()),
    }
}

impl AuthTransport for GraphqlTransport {
    async fn sign_in(&self, email: &str, share_token: &str) -> Result<TokenGrant, AuthError> {
        let variables = json!({
            "input": {
                "email": email,
                "token": share_token,
            },
        });
        let data = self
            .execute(None, SIGN_IN_MUTATION, variables)
            .await
            .map_err(transport_auth_err)?;
        parse_sign_in(&data["signIn"])
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        let variables = json!({
            "input": {
                "token": refresh_token,
            },
        });
        let data = self
            .execute(None, REFRESH_MUTATION, variables)
            .await
            .map_err(transport_auth_err)?;
        parse_refresh(&data["refreshToken"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sign_in_success() {
        let payload = json!({
            "accessToken": "access-1",
            "refreshToken": "refresh-1",
            "ttl": 604800,
            "user": {"temperatureUnit": "C"}
        });
        let grant = parse_sign_in(&payload).unwrap();
        assert_eq!(grant.access_token, "access-1");
        assert_eq!(grant.refresh_token, "refresh-1");
        assert_eq!(grant.ttl, 604800);
        assert_eq!(grant.temperature_unit.as_deref(), Some("C"));
    }

    #[test]
    fn test_parse_sign_in_token_invalid() {
        let payload = json!({
            "__typename": "TokenInvalid",
            "message": "Token has expired"
        });
        let err = parse_sign_in(&payload).unwrap_err();
        assert!(matches!(err, AuthError::ExpiredShareToken));
    }

    #[test]
    fn test_parse_sign_in_email_invalid() {
        let payload = json!({
            "__typename": "EmailInvalid",
            "message": "No account for that email"
        });
        let err = parse_sign_in(&payload).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential(_)));
    }

    #[test]
    fn test_parse_refresh_rejection_is_revoked() {
        let payload = json!({
            "__typename": "TokenInvalid",
            "message": "Refresh token revoked"
        });
        let err = parse_refresh(&payload).unwrap_err();
        assert!(matches!(err, AuthError::RevokedRefreshToken));
    }

    #[test]
    fn test_parse_refresh_success_has_no_user() {
        let payload = json!({
            "accessToken": "access-2",
            "refreshToken": "refresh-2",
            "ttl": 3600
        });
        let grant = parse_refresh(&payload).unwrap();
        assert_eq!(grant.access_token, "access-2");
        assert!(grant.temperature_unit.is_none());
    }

    #[test]
    fn test_malformed_grant_is_a_network_failure() {
        let payload = json!({"accessToken": "only-half-a-grant"});
        let err = parse_sign_in(&payload).unwrap_err();
        assert!(matches!(err, AuthError::NetworkFailure(_)));
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_classify_unauthenticated_by_code() {
        let errors: Vec<GraphqlErrorEntry> = serde_json::from_value(json!([
            {"message": "not allowed", "extensions": {"code": "UNAUTHENTICATED"}}
        ]))
        .unwrap();
        assert!(matches!(
            classify_graphql_errors(&errors),
            ApiError::Unauthorized
        ));
    }

    #[test]
    fn test_classify_unauthenticated_by_message() {
        let errors: Vec<GraphqlErrorEntry> =
            serde_json::from_value(json!([{"message": "UNAUTHENTICATED: expired"}])).unwrap();
        assert!(matches!(
            classify_graphql_errors(&errors),
            ApiError::Unauthorized
        ));
    }

    #[test]
    fn test_classify_other_errors_join_messages() {
        let errors: Vec<GraphqlErrorEntry> =
            serde_json::from_value(json!([{"message": "first"}, {"message": "second"}])).unwrap();
        match classify_graphql_errors(&errors) {
            ApiError::Api(msg) => assert_eq!(msg, "first; second"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
