//! services/api/src/adapters/token.rs
//!
//! OAuth access tokens for a Google service account: an RS256-signed JWT
//! assertion is exchanged at the token endpoint, and the resulting bearer token
//! is cached until shortly before it expires.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use warehouse_core::ports::{PortError, PortResult};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct ServiceAccountTokens {
    client: reqwest::Client,
    email: String,
    key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    /// Fails with `PortError::Unauthorized` when the PEM key cannot be parsed.
    pub fn new(client: reqwest::Client, email: &str, private_key_pem: &str) -> PortResult<Self> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| PortError::Unauthorized(format!("invalid service account key: {}", e)))?;
        Ok(Self {
            client,
            email: email.to_string(),
            key,
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self) -> PortResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.email,
            scope: SHEETS_SCOPE,
            aud: TOKEN_URL,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| PortError::Unauthorized(format!("could not sign assertion: {}", e)))
    }

    /// A bearer token valid for at least `REFRESH_MARGIN`.
    pub async fn access_token(&self) -> PortResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        debug!(account = %self.email, "Requesting a new access token");
        let assertion = self.assertion()?;
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PortError::Unavailable(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                PortError::Unavailable(format!("token endpoint returned {}: {}", status, body))
            } else {
                PortError::Unauthorized(format!("token request rejected ({}): {}", status, body))
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PortError::Malformed(format!("unexpected token response: {}", e)))?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_key_is_unauthorized() {
        let err = ServiceAccountTokens::new(reqwest::Client::new(), "bot@example.com", "not a key")
            .err()
            .unwrap();
        assert!(matches!(err, PortError::Unauthorized(_)));
    }

    #[test]
    fn claims_target_the_sheets_scope() {
        let claims = Claims {
            iss: "bot@example.com",
            scope: SHEETS_SCOPE,
            aud: TOKEN_URL,
            iat: 100,
            exp: 100 + ASSERTION_LIFETIME_SECS,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["scope"], "https://www.googleapis.com/auth/spreadsheets");
        assert_eq!(json["exp"], 3700);
    }
}
