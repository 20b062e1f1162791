//! OAuth2 access tokens for the Sheets and Drive clients.

use crate::TokenSource;
use crate::config::Credentials;
use crate::errors::GoogleError;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use url::Url;

// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

pub struct Authenticator {
    client: reqwest::Client,
    token_url: Url,
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl Authenticator {
    pub fn new(client: reqwest::Client, token_url: Url, credentials: Credentials) -> Self {
        Authenticator {
            client,
            token_url,
            credentials,
            cached: Mutex::new(None),
        }
    }

    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<CachedToken, GoogleError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {description}", err.error),
                    None => err.error,
                },
                Err(_) => format!("token endpoint returned {status}"),
            };
            return Err(GoogleError::Auth(message));
        }

        let token = response.json::<TokenResponse>().await?;
        tracing::debug!(expires_in = token.expires_in, "Refreshed Google access token");

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        Ok(CachedToken {
            token: token.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl TokenSource for Authenticator {
    async fn access_token(&self) -> Result<String, GoogleError> {
        let (client_id, client_secret, refresh_token) = match &self.credentials {
            Credentials::AccessToken { token } => return Ok(token.clone()),
            Credentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => (client_id, client_secret, refresh_token),
        };

        // Holding the lock across the refresh keeps concurrent callers from
        // hitting the token endpoint at the same time.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.token.clone());
        }

        let fresh = self
            .refresh(client_id, client_secret, refresh_token)
            .await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
