//! Environment-driven configuration.
//!
//! Everything is read once at startup; a missing required variable aborts
//! startup with `RelayError::Config`. `.env` files are honored for local
//! runs. Secrets never appear in `Debug` output.

use crate::errors::RelayError;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub line: LineConfig,
    pub database: DatabaseConfig,
    pub drive: DriveConfig,
    pub server: ServerConfig,
    /// Root of the local backup tree; day folders are created beneath it.
    pub output_dir: PathBuf,
    /// Static sender-id → display-name mapping, supplied as a JSON object.
    pub user_mapping: HashMap<String, String>,
    /// When true, a parsed album identity is remembered per sender and
    /// consulted when foldering that sender's media. When false the album
    /// is confirmed and discarded.
    pub persist_albums: bool,
}

#[derive(Clone)]
pub struct LineConfig {
    pub channel_secret: String,
    pub access_token: String,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

#[derive(Clone)]
pub struct DriveConfig {
    /// Fixed parent folder all day folders live under.
    pub root_folder_id: String,
    /// Credentials JSON blob (see `DriveCredentials`), normally produced
    /// by `linedrop encode-credentials`.
    pub credentials_json: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, RelayError> {
        let line = LineConfig {
            channel_secret: required("LINE_CHANNEL_SECRET")?,
            access_token: required("LINE_CHANNEL_ACCESS_TOKEN")?,
        };

        let database = DatabaseConfig {
            host: required("PGHOST")?,
            port: required("PGPORT")?
                .parse()
                .map_err(|_| RelayError::Config("PGPORT must be a port number".into()))?,
            name: required("PGDATABASE")?,
            user: required("PGUSER")?,
            password: required("PGPASSWORD")?,
        };

        let drive = DriveConfig {
            root_folder_id: required("GOOGLE_DRIVE_FOLDER_ID")?,
            credentials_json: required("GOOGLE_CREDENTIALS_JSON")?,
        };

        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: required("PORT")?
                .parse()
                .map_err(|_| RelayError::Config("PORT must be a port number".into()))?,
        };

        let output_dir =
            PathBuf::from(env::var("OUTPUT_DIR").unwrap_or_else(|_| "./output".to_string()));

        let user_mapping = match env::var("USER_MAPPING_JSON") {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(|e| {
                RelayError::Config(format!("USER_MAPPING_JSON is not a JSON object: {}", e))
            })?,
            _ => HashMap::new(),
        };

        let persist_albums = env::var("PERSIST_ALBUMS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            line,
            database,
            drive,
            server,
            output_dir,
            user_mapping,
            persist_albums,
        })
    }
}

fn required(name: &str) -> Result<String, RelayError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(RelayError::Config(format!(
            "Please set {} in your environment",
            name
        ))),
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() { "[empty]" } else { "[REDACTED]" }
}

impl fmt::Debug for LineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineConfig")
            .field("channel_secret", &redact(&self.channel_secret))
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .finish()
    }
}

impl fmt::Debug for DriveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveConfig")
            .field("root_folder_id", &self.root_folder_id)
            .field("credentials_json", &redact(&self.credentials_json))
            .finish()
    }
}

#[cfg(test)]
mod tests;
