//! Google Drive media store.
//!
//! Uploads land under one fixed root folder, grouped into per-day (or
//! per-album) subfolders. The store is idempotent two ways: a mutex-held
//! folder cache serializes resolve-or-create so concurrent first uploads
//! of a day cannot race duplicate folders into existence, and an exact
//! filename query short-circuits re-uploads of redelivered messages.

pub mod auth;

use crate::errors::RelayError;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use auth::DriveCredentials;
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const API_BASE: &str = "https://www.googleapis.com";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload bytes as `filename` inside `folder_name` under the root.
    /// Returns the remote file id — the existing one if the name is
    /// already present (no re-upload).
    async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        folder_name: &str,
        mime_type: &str,
    ) -> Result<String, RelayError>;
}

pub struct DriveStore {
    client: reqwest::Client,
    credentials: Mutex<DriveCredentials>,
    root_folder_id: String,
    api_base: String,
    /// folder name → id, held across resolve-or-create.
    folder_ids: Mutex<HashMap<String, String>>,
}

impl DriveStore {
    pub fn new(credentials: DriveCredentials, root_folder_id: &str) -> Self {
        Self::with_base_url(credentials, root_folder_id, API_BASE)
    }

    pub fn with_base_url(
        credentials: DriveCredentials,
        root_folder_id: &str,
        api_base: &str,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            credentials: Mutex::new(credentials),
            root_folder_id: root_folder_id.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            folder_ids: Mutex::new(HashMap::new()),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut creds = self.credentials.lock().await;
        if !creds.is_valid() && creds.can_refresh() {
            info!("Drive access token expired, refreshing");
            creds.refresh(&self.client).await?;
        }
        Ok(creds.token.clone())
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&token)
            .send()
            .await?;

        // On 401, force a refresh and retry once
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            info!("Drive API returned 401, refreshing token and retrying");
            let new_token = {
                let mut creds = self.credentials.lock().await;
                creds.refresh(&self.client).await?;
                creds.token.clone()
            };
            let retry = self
                .client
                .get(url)
                .query(query)
                .bearer_auth(&new_token)
                .send()
                .await?;
            return Ok(retry.error_for_status()?.json().await?);
        }

        Ok(response.error_for_status()?.json().await?)
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(url)
            .query(&[("fields", "id")])
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// First file id matching `q`, if any.
    async fn query_one(&self, q: &str) -> Result<Option<String>> {
        let url = format!("{}/drive/v3/files", self.api_base);
        let data = self
            .get_json(&url, &[("q", q), ("spaces", "drive"), ("fields", "files(id, name)")])
            .await?;
        Ok(data["files"]
            .as_array()
            .and_then(|files| files.first())
            .and_then(|f| f["id"].as_str())
            .map(str::to_string))
    }

    /// Resolve a child folder under the root, creating it if absent. The
    /// cache lock is held across query and create so only one caller can
    /// perform the first resolution of a given name.
    pub async fn get_or_create_folder(&self, name: &str) -> Result<String, RelayError> {
        let mut folder_ids = self.folder_ids.lock().await;
        if let Some(id) = folder_ids.get(name) {
            return Ok(id.clone());
        }

        let q = format!(
            "mimeType = '{}' and name = '{}' and '{}' in parents and trashed = false",
            FOLDER_MIME,
            escape_query_value(name),
            self.root_folder_id
        );
        if let Some(id) = self
            .query_one(&q)
            .await
            .map_err(|e| RelayError::Upload(format!("folder lookup failed: {}", e)))?
        {
            debug!("found existing folder '{}' with id {}", name, id);
            folder_ids.insert(name.to_string(), id.clone());
            return Ok(id);
        }

        let url = format!("{}/drive/v3/files", self.api_base);
        let body = json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [self.root_folder_id],
        });
        let created = self
            .post_json(&url, &body)
            .await
            .map_err(|e| RelayError::Upload(format!("folder create failed: {}", e)))?;
        let id = created["id"]
            .as_str()
            .ok_or_else(|| RelayError::Upload("folder create returned no id".into()))?
            .to_string();
        info!("created folder '{}' with id {}", name, id);
        folder_ids.insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn find_file(&self, folder_id: &str, filename: &str) -> Result<Option<String>, RelayError> {
        let q = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            escape_query_value(filename),
            folder_id
        );
        self.query_one(&q)
            .await
            .map_err(|e| RelayError::Upload(format!("duplicate check failed: {}", e)))
    }

    /// Two-step resumable upload: metadata POST opens a session, the
    /// bytes PUT completes it.
    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        filename: &str,
        folder_id: &str,
        mime_type: &str,
    ) -> Result<String> {
        let token = self.access_token().await?;
        let url = format!("{}/upload/drive/v3/files", self.api_base);
        let metadata = json!({"name": filename, "parents": [folder_id]});

        let session = self
            .client
            .post(&url)
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", mime_type)
            .json(&metadata)
            .send()
            .await?
            .error_for_status()?;

        let session_uri = session
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow!("upload session returned no Location header"))?
            .to_string();

        let created: serde_json::Value = self
            .client
            .put(&session_uri)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(data)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        created["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("upload returned no file id"))
    }

    /// Name of the configured root folder; used by the `doctor`
    /// connectivity check.
    pub async fn root_folder_name(&self) -> Result<String, RelayError> {
        let url = format!("{}/drive/v3/files/{}", self.api_base, self.root_folder_id);
        let data = self
            .get_json(&url, &[("fields", "id, name")])
            .await
            .map_err(|e| RelayError::Upload(format!("root folder lookup failed: {}", e)))?;
        data["name"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RelayError::Upload("root folder has no name".into()))
    }
}

#[async_trait]
impl MediaStore for DriveStore {
    async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        folder_name: &str,
        mime_type: &str,
    ) -> Result<String, RelayError> {
        let folder_id = self.get_or_create_folder(folder_name).await?;

        if let Some(existing) = self.find_file(&folder_id, filename).await? {
            info!("file {} already exists in Drive, skipping upload", filename);
            return Ok(existing);
        }

        let size = data.len();
        let id = self
            .upload_bytes(data, filename, &folder_id, mime_type)
            .await
            .map_err(|e| {
                warn!("upload of {} failed: {}", filename, e);
                RelayError::Upload(e.to_string())
            })?;
        info!("uploaded {} ({} bytes) to Drive, file id {}", filename, size, id);
        Ok(id)
    }
}

/// Drive query values are single-quoted; escape embedded quotes and the
/// escape character itself.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
