//! Identity-token verification against the Identity Toolkit REST API.

use std::time::Duration;

use futures::future::BoxFuture;
use medi_core::error::AppError;
use medi_core::traits::IdentityVerifier;
use medi_core::user::VerifiedIdentity;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Verifies identity tokens by looking up the account they belong to.
#[derive(Clone)]
pub struct IdentityToolkitVerifier {
    client: Client,
    lookup_url: Url,
    timeout_secs: u64,
}

impl IdentityToolkitVerifier {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError("identity API key is empty".into()));
        }

        let mut lookup_url = Url::parse(&format!(
            "{}/accounts:lookup",
            base_url.trim_end_matches('/')
        ))
        .map_err(|e| AppError::ConfigError(format!("invalid identity base URL: {e}")))?;
        lookup_url.query_pairs_mut().append_pair("key", api_key);

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            lookup_url,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        })
    }

    async fn lookup(&self, token: &str) -> Result<VerifiedIdentity, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::Unauthorized("empty identity token".into()));
        }

        let response = self
            .client
            .post(self.lookup_url.clone())
            .json(&LookupRequest { id_token: token })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {}", e))
                } else {
                    AppError::IdentityError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimitExceeded);
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            if status == StatusCode::BAD_REQUEST && is_token_error(&reason) {
                tracing::debug!(%reason, "Identity token rejected");
                return Err(AppError::Unauthorized(format!(
                    "identity token rejected: {reason}"
                )));
            }
            tracing::warn!(%reason, status = status.as_u16(), "Identity service refused lookup");
            return Err(AppError::IdentityError(format!(
                "identity service returned HTTP {}: {reason}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(AppError::IdentityError(format!(
                "identity service returned HTTP {}",
                status.as_u16()
            )));
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| AppError::IdentityError(format!("Failed to parse lookup response: {e}")))?;

        let account = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Unauthorized("no account for identity token".into()))?;

        if account.disabled {
            return Err(AppError::Forbidden("account is disabled".into()));
        }

        Ok(VerifiedIdentity {
            uid: account.local_id,
            email: account.email,
            display_name: account.display_name,
            email_verified: account.email_verified,
        })
    }
}

/// Error codes that mean the token itself is bad, as opposed to the
/// API key or quota. Messages look like `INVALID_ID_TOKEN` or
/// `TOKEN_EXPIRED : details`.
fn is_token_error(reason: &str) -> bool {
    const TOKEN_ERRORS: &[&str] = &[
        "INVALID_ID_TOKEN",
        "TOKEN_EXPIRED",
        "USER_NOT_FOUND",
        "USER_DISABLED",
        "CREDENTIAL_TOO_OLD_LOGIN_AGAIN",
    ];
    let code = reason.split([' ', ':']).next().unwrap_or_default();
    TOKEN_ERRORS.contains(&code)
}

impl IdentityVerifier for IdentityToolkitVerifier {
    fn verify<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<VerifiedIdentity, AppError>> {
        Box::pin(self.lookup(token))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<Account>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    disabled: bool,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}
