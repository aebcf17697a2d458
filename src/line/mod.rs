//! LINE Messaging API client.
//!
//! Three calls the relay needs: reply to an event, look up a sender's
//! profile, and download message content (image/video bytes). All are
//! plain bearer-authenticated REST calls; the trait seam exists so the
//! dispatcher can be exercised with stubs.

use crate::errors::RelayError;
use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const API_BASE: &str = "https://api.line.me";
const DATA_BASE: &str = "https://api-data.line.me";

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[async_trait]
pub trait LineApi: Send + Sync {
    /// Answer the triggering event. The reply token is single-use; the
    /// call is fire-and-forget from the relay's perspective.
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), RelayError>;

    async fn get_profile(&self, user_id: &str) -> Result<Profile, RelayError>;

    /// Raw bytes of an image/video attachment.
    async fn get_message_content(&self, message_id: &str) -> Result<Vec<u8>, RelayError>;
}

pub struct LineClient {
    client: reqwest::Client,
    access_token: String,
    api_base: String,
    data_base: String,
}

impl LineClient {
    pub fn new(access_token: &str) -> Self {
        Self::with_base_urls(access_token, API_BASE, DATA_BASE)
    }

    /// Base-URL override for tests against a local mock server.
    pub fn with_base_urls(access_token: &str, api_base: &str, data_base: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            access_token: access_token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            data_base: data_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LineApi for LineClient {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), RelayError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let body = json!({
            "replyToken": reply_token,
            "messages": [{"type": "text", "text": text}],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Internal(anyhow!("reply request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(RelayError::Internal(anyhow!(
                "reply API error ({}): {}",
                status,
                detail
            )));
        }
        debug!("replied to event, text_len={}", text.len());
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, RelayError> {
        let url = format!("{}/v2/bot/profile/{}", self.api_base, user_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| RelayError::ProfileLookup(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::ProfileLookup(format!(
                "profile API returned {} for user {}",
                response.status(),
                user_id
            )));
        }
        response
            .json::<Profile>()
            .await
            .map_err(|e| RelayError::ProfileLookup(e.to_string()))
    }

    async fn get_message_content(&self, message_id: &str) -> Result<Vec<u8>, RelayError> {
        let url = format!("{}/v2/bot/message/{}/content", self.data_base, message_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| RelayError::Internal(anyhow!("content request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Internal(anyhow!(
                "content API returned {} for message {}",
                response.status(),
                message_id
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::Internal(anyhow!("content read failed: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
