//! Text persistence: per-day local log files and the remote `messages`
//! table. Both sides are best-effort — a failed write is logged by the
//! dispatcher and never fails the webhook response, so the two copies can
//! diverge.

use crate::config::DatabaseConfig;
use crate::errors::RelayError;
use crate::policy;
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime};
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

/// Append-only per-day text log under the output root:
/// `{output_dir}/{YYYY-MM-DD}/{YYYY-MM-DD}_msg.txt`.
///
/// Each append opens, writes and closes the file — no long-lived handle,
/// so every line is flushed even if the process dies mid-day.
#[derive(Clone)]
pub struct LocalLog {
    output_dir: PathBuf,
}

impl LocalLog {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn append(
        &self,
        dt: DateTime<Local>,
        display_name: &str,
        text: &str,
    ) -> Result<PathBuf, RelayError> {
        let folder = self.output_dir.join(policy::day_folder(dt));
        std::fs::create_dir_all(&folder)
            .map_err(|e| RelayError::Persistence(format!("create {}: {}", folder.display(), e)))?;

        let file_path = folder.join(policy::log_filename(dt));
        let line = policy::log_line(dt, display_name, text);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .map_err(|e| {
                RelayError::Persistence(format!("open {}: {}", file_path.display(), e))
            })?;
        file.write_all(line.as_bytes()).map_err(|e| {
            RelayError::Persistence(format!("append {}: {}", file_path.display(), e))
        })?;
        debug!("appended text message to {}", file_path.display());
        Ok(file_path)
    }
}

/// A row of the remote `messages` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRecord {
    pub id: i32,
    pub user_id: String,
    pub display_name: Option<String>,
    pub message_text: Option<String>,
    pub created_at: NaiveDateTime,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert one text message; returns the generated row id.
    async fn insert(
        &self,
        dt: DateTime<Local>,
        user_id: &str,
        display_name: &str,
        text: &str,
    ) -> Result<i32, RelayError>;
}

/// Postgres-backed message store. One connection per call, opened and
/// closed around each statement — no pooling.
pub struct PgMessageStore {
    options: PgConnectOptions,
}

impl PgMessageStore {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password);
        Self { options }
    }

    async fn connect(&self) -> Result<PgConnection, RelayError> {
        PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| RelayError::Persistence(format!("connect: {}", e)))
    }

    /// Create the `messages` table if it does not exist yet. Called once
    /// at startup; failures are logged by the caller, not fatal.
    pub async fn init_schema(&self) -> Result<(), RelayError> {
        let mut conn = self.connect().await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id SERIAL PRIMARY KEY,
                user_id VARCHAR(255) NOT NULL,
                display_name VARCHAR(255),
                message_text TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&mut conn)
        .await
        .map_err(|e| RelayError::Persistence(format!("init schema: {}", e)))?;
        conn.close()
            .await
            .map_err(|e| RelayError::Persistence(format!("close: {}", e)))?;
        info!("messages table initialized (created if absent)");
        Ok(())
    }

    /// Maintenance: rewrite a message's text, bumping `created_at`.
    pub async fn update_text(&self, id: i32, new_text: &str) -> Result<(), RelayError> {
        let mut conn = self.connect().await?;
        sqlx::query(
            "UPDATE messages SET message_text = $1, created_at = CURRENT_TIMESTAMP WHERE id = $2",
        )
        .bind(new_text)
        .bind(id)
        .execute(&mut conn)
        .await
        .map_err(|e| RelayError::Persistence(format!("update: {}", e)))?;
        conn.close()
            .await
            .map_err(|e| RelayError::Persistence(format!("close: {}", e)))?;
        Ok(())
    }

    /// Maintenance: delete a message row.
    pub async fn delete(&self, id: i32) -> Result<(), RelayError> {
        let mut conn = self.connect().await?;
        sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&mut conn)
            .await
            .map_err(|e| RelayError::Persistence(format!("delete: {}", e)))?;
        conn.close()
            .await
            .map_err(|e| RelayError::Persistence(format!("close: {}", e)))?;
        Ok(())
    }

    /// Most recent messages, newest first.
    pub async fn fetch_recent(&self, limit: i64) -> Result<Vec<MessageRecord>, RelayError> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, user_id, display_name, message_text, created_at
             FROM messages ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&mut conn)
        .await
        .map_err(|e| RelayError::Persistence(format!("select: {}", e)))?;
        conn.close()
            .await
            .map_err(|e| RelayError::Persistence(format!("close: {}", e)))?;
        Ok(rows)
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(
        &self,
        dt: DateTime<Local>,
        user_id: &str,
        display_name: &str,
        text: &str,
    ) -> Result<i32, RelayError> {
        let mut conn = self.connect().await?;
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO messages (user_id, display_name, message_text, created_at)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(user_id)
        .bind(display_name)
        .bind(text)
        .bind(dt.naive_local())
        .fetch_one(&mut conn)
        .await
        .map_err(|e| RelayError::Persistence(format!("insert: {}", e)))?;
        conn.close()
            .await
            .map_err(|e| RelayError::Persistence(format!("close: {}", e)))?;
        info!("inserted text message into DB with id {}", id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests;
