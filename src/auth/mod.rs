//! Delegated sign-in against the Microsoft identity platform.
//!
//! The flow is: cached refresh token → refresh grant; otherwise the OAuth 2.0
//! device authorization grant, where the user completes sign-in in a browser
//! with a short code. The resulting refresh token is cached so subsequent
//! runs, and 401 recovery during a run, do not prompt again.

pub mod cache;
pub mod endpoints;
pub mod error;
pub mod responses;

use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Mutex;

use self::cache::TokenCache;
use self::endpoints::Endpoints;
use self::error::AuthError;
use self::responses::{DeviceCodeResponse, TokenErrorResponse, TokenResponse};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Bearer token with its local expiry instant.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: Instant,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            secret: secret.into(),
            expires_at: Instant::now() + lifetime,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for the Graph client.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a fresh token after the current one was rejected.
    async fn refresh(&self) -> Result<AccessToken, AuthError>;
}

pub struct Authenticator {
    client: Client,
    endpoints: Endpoints,
    tenant: String,
    client_id: String,
    cache: TokenCache,
    refresh_token: Mutex<Option<String>>,
}

impl Authenticator {
    pub fn new(
        client: Client,
        endpoints: Endpoints,
        tenant: &str,
        client_id: &str,
        cache: TokenCache,
    ) -> Self {
        Self {
            client,
            endpoints,
            tenant: tenant.to_string(),
            client_id: client_id.to_string(),
            cache,
            refresh_token: Mutex::new(None),
        }
    }

    /// Acquire an initial token, preferring the cached refresh token and
    /// falling back to an interactive device-code sign-in.
    pub async fn acquire(&self) -> Result<AccessToken, AuthError> {
        if let Some(cached) = self.cache.load().await {
            tracing::debug!("Trying cached refresh token");
            match self.refresh_grant(&cached).await {
                Ok(token) => {
                    tracing::info!("Signed in with cached credentials");
                    return Ok(token);
                }
                Err(e) => {
                    tracing::info!("Cached credentials rejected, signing in again: {}", e);
                    self.cache.clear().await;
                }
            }
        }
        self.device_code_sign_in().await
    }

    async fn device_code_sign_in(&self) -> Result<AccessToken, AuthError> {
        let response = self
            .client
            .post(self.endpoints.device_code_url(&self.tenant))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", self.endpoints.scopes().as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(token_endpoint_error(status.as_u16(), response.text().await?));
        }
        let code: DeviceCodeResponse = response.json().await?;

        // The prompt must reach the user even when logging is filtered.
        match &code.message {
            Some(message) => eprintln!("{}", message),
            None => eprintln!(
                "To sign in, open {} and enter the code {}",
                code.verification_uri, code.user_code
            ),
        }

        let deadline = Instant::now() + Duration::from_secs(code.expires_in);
        let mut interval = Duration::from_secs(code.interval.max(1));
        loop {
            tokio::time::sleep(interval).await;
            if Instant::now() >= deadline {
                return Err(AuthError::Expired);
            }
            let response = self
                .client
                .post(self.endpoints.token_url(&self.tenant))
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", code.device_code.as_str()),
                ])
                .send()
                .await?;
            let status = response.status();
            if status.is_success() {
                let token: TokenResponse = response.json().await?;
                tracing::info!("Sign-in completed");
                return self.accept(token).await;
            }

            let body = response.text().await?;
            match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error.as_str() {
                    "authorization_pending" => continue,
                    "slow_down" => {
                        interval += Duration::from_secs(5);
                        continue;
                    }
                    "expired_token" | "code_expired" => return Err(AuthError::Expired),
                    "authorization_declined" => return Err(AuthError::Declined),
                    _ => {
                        return Err(AuthError::Rejected {
                            error: err.error,
                            description: err.error_description,
                        })
                    }
                },
                Err(_) => return Err(token_endpoint_error(status.as_u16(), body)),
            }
        }
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<AccessToken, AuthError> {
        let scopes = self.endpoints.scopes();
        let response = self
            .client
            .post(self.endpoints.token_url(&self.tenant))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("scope", scopes.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(token_endpoint_error(status.as_u16(), response.text().await?));
        }
        let token: TokenResponse = response.json().await?;
        self.accept(token).await
    }

    /// Remember and persist a rotated refresh token, return the access token.
    async fn accept(&self, token: TokenResponse) -> Result<AccessToken, AuthError> {
        if let Some(rt) = &token.refresh_token {
            if let Err(e) = self.cache.store(rt).await {
                tracing::warn!("Failed to cache refresh token: {}", e);
            }
            *self.refresh_token.lock().await = Some(rt.clone());
        }
        Ok(AccessToken::new(
            token.access_token,
            Duration::from_secs(token.expires_in),
        ))
    }
}

#[async_trait::async_trait]
impl TokenSource for Authenticator {
    async fn refresh(&self) -> Result<AccessToken, AuthError> {
        let current = self.refresh_token.lock().await.clone();
        match current {
            Some(rt) => self.refresh_grant(&rt).await,
            None => self.device_code_sign_in().await,
        }
    }
}

fn token_endpoint_error(code: u16, body: String) -> AuthError {
    match serde_json::from_str::<TokenErrorResponse>(&body) {
        Ok(err) => AuthError::Rejected {
            error: err.error,
            description: err.error_description,
        },
        Err(_) => AuthError::ApiError {
            code,
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_expiry() {
        let live = AccessToken::new("abc", Duration::from_secs(3600));
        assert!(!live.is_expired());
        assert_eq!(live.secret(), "abc");
        let dead = AccessToken::new("abc", Duration::ZERO);
        assert!(dead.is_expired());
    }

    #[test]
    fn test_access_token_debug_redacts_secret() {
        let token = AccessToken::new("super-secret", Duration::from_secs(60));
        assert!(!format!("{:?}", token).contains("super-secret"));
    }

    #[test]
    fn test_token_endpoint_error_parses_oauth_body() {
        let err = token_endpoint_error(
            400,
            r#"{"error":"invalid_grant","error_description":"AADSTS70000"}"#.into(),
        );
        match err {
            AuthError::Rejected { error, .. } => assert_eq!(error, "invalid_grant"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_token_endpoint_error_non_json() {
        let err = token_endpoint_error(502, "Bad Gateway".into());
        assert!(matches!(err, AuthError::ApiError { code: 502, .. }));
    }
}
