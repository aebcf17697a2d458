//! Google OAuth token holder for the Drive store.
//!
//! No interactive flow lives here: the relay is handed a credentials blob
//! (token + refresh token) via the environment and only performs the
//! direct token-endpoint refresh when the access token has expired.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DriveCredentials {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Unix timestamp; `None` means unknown.
    #[serde(default)]
    pub expiry: Option<u64>,
}

impl DriveCredentials {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse Drive credentials JSON")
    }

    pub fn is_valid(&self) -> bool {
        if let Some(expiry) = self.expiry {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() < expiry)
                .unwrap_or(false)
        } else {
            false // No expiry means we don't know — refresh to be safe
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) -> Result<()> {
        let refresh_token = self
            .refresh_token
            .as_ref()
            .ok_or_else(|| anyhow!("No refresh token available"))?;

        let mut params = HashMap::new();
        params.insert("refresh_token", refresh_token.clone());
        params.insert("client_id", self.client_id.clone());
        params.insert("client_secret", self.client_secret.clone());
        params.insert("grant_type", "refresh_token".to_string());

        let response = client.post(&self.token_uri).form(&params).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Token refresh failed: {}", error_text));
        }

        let token_data: serde_json::Value = response.json().await?;

        if token_data.get("error").is_some() {
            let error_desc = token_data
                .get("error_description")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            return Err(anyhow!("Token refresh failed: {}", error_desc));
        }

        self.token = token_data["access_token"]
            .as_str()
            .ok_or_else(|| anyhow!("Missing access_token"))?
            .to_string();

        if let Some(refresh_token) = token_data.get("refresh_token").and_then(|v| v.as_str()) {
            self.refresh_token = Some(refresh_token.to_string());
        }

        if let Some(expires_in) = token_data.get("expires_in").and_then(|v| v.as_u64()) {
            if let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) {
                self.expiry = Some(duration.as_secs() + expires_in);
            }
        }

        Ok(())
    }
}

impl fmt::Debug for DriveCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveCredentials")
            .field("token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .finish()
    }
}
