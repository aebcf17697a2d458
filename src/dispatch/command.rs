//! The "create album" text-command mini-grammar.

use crate::errors::RelayError;
use chrono::NaiveDate;

pub const CREATE_ALBUM: &str = "建立相簿";
pub const CREATE_ALBUM_PREFIX: &str = "建立相簿:";

pub const REPLY_USAGE: &str = "請輸入相簿資料，格式：\n建立相簿: YYYY-MM-DD, 相簿名稱\n例如：建立相簿: 2023-03-12, 我的假期";
pub const REPLY_BAD_FORMAT: &str = "請使用正確格式，範例：建立相簿: 2023-03-12, 我的假期";
pub const REPLY_BAD_DATE: &str = "日期格式不正確，請使用 YYYY-MM-DD 格式";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumCommand {
    /// Bare `建立相簿` — answer with usage instructions.
    Usage,
    /// `建立相簿: <date>, <name>` with a valid calendar date.
    Create { date: String, name: String },
}

impl AlbumCommand {
    pub fn full_album_name(date: &str, name: &str) -> String {
        format!("{}_{}", date, name)
    }
}

/// `None` — not an album command at all, treat as an ordinary message.
/// `Some(Err(_))` — a malformed command; the error carries the corrective
/// reply to send back, and nothing else happens.
pub fn parse_album_command(text: &str) -> Option<Result<AlbumCommand, RelayError>> {
    if text == CREATE_ALBUM {
        return Some(Ok(AlbumCommand::Usage));
    }

    let details = text.strip_prefix(CREATE_ALBUM_PREFIX)?.trim();

    let Some((date_part, album_name)) = details.split_once(',') else {
        return Some(Err(RelayError::CommandParse(REPLY_BAD_FORMAT.to_string())));
    };
    let date_part = date_part.trim();
    let album_name = album_name.trim();

    if NaiveDate::parse_from_str(date_part, "%Y-%m-%d").is_err() {
        return Some(Err(RelayError::CommandParse(REPLY_BAD_DATE.to_string())));
    }

    Some(Ok(AlbumCommand::Create {
        date: date_part.to_string(),
        name: album_name.to_string(),
    }))
}
