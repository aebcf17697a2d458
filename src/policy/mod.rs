//! Pure naming policy: day folders, media filenames, log lines.
//!
//! No I/O lives here — everything is a function of the event timestamp,
//! the resolved display name, and the message identity, so the whole
//! policy is unit-testable without adapters.

use chrono::{DateTime, Local, TimeZone};

/// Sentinel display name used when a profile lookup fails or a sanitized
/// name comes out empty.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

/// Media kinds the relay archives. Dedup tracking and filename extensions
/// are keyed per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Image => "image/jpeg",
            Self::Video => "video/mp4",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// Convert a platform timestamp (epoch milliseconds) to local wall-clock
/// time. Day folders group by the local calendar date, matching what the
/// people in the chat would call "today".
pub fn local_datetime(timestamp_millis: i64) -> DateTime<Local> {
    Local
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .unwrap_or_else(|| Local.timestamp_millis_opt(0).single().unwrap_or_default())
}

/// Filter a display name down to `[A-Za-z0-9_-]`. Characters outside the
/// class are deleted, not replaced, so CJK names collapse toward empty —
/// an empty result falls back to the `Unknown` sentinel rather than
/// producing filenames that start with `_`.
pub fn sanitize_display_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        UNKNOWN_DISPLAY_NAME.to_string()
    } else {
        cleaned
    }
}

/// Day folder name for an event, e.g. `2025-03-15`.
pub fn day_folder(dt: DateTime<Local>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

/// Minute-resolution key used by the sequence-counter fallback, e.g.
/// `20250315_0910`.
pub fn minute_key(dt: DateTime<Local>) -> String {
    dt.format("%Y%m%d_%H%M").to_string()
}

/// Media filename: `{name}_{YYYYMMDD}_{HHMM}_{discriminator}.{ext}`.
///
/// The discriminator is the platform message id when present — unique and
/// redelivery-safe. [`sequence_discriminator`] provides the fallback.
pub fn media_filename(
    sanitized_name: &str,
    dt: DateTime<Local>,
    discriminator: &str,
    kind: MediaKind,
) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        sanitized_name,
        dt.format("%Y%m%d"),
        dt.format("%H%M"),
        discriminator,
        kind.extension()
    )
}

/// Zero-padded discriminator for events lacking a message id. Collides
/// across process restarts (the counter resets to zero).
pub fn sequence_discriminator(sequence: u32) -> String {
    format!("{:02}", sequence)
}

/// One line of the per-day text log: `HH:MM | {name} | {text}\n`.
///
/// Embedded CR/LF in the message text are escaped to a literal `\n` so
/// the log stays line-parseable; pipes are left alone.
pub fn log_line(dt: DateTime<Local>, display_name: &str, text: &str) -> String {
    let flattened = text.replace("\r\n", "\\n").replace(['\r', '\n'], "\\n");
    format!("{} | {} | {}\n", dt.format("%H:%M"), display_name, flattened)
}

/// Per-day log filename, e.g. `2025-03-15_msg.txt`.
pub fn log_filename(dt: DateTime<Local>) -> String {
    format!("{}_msg.txt", dt.format("%Y-%m-%d"))
}
