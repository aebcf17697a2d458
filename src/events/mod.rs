//! Webhook payload decoding.
//!
//! The LINE platform delivers a JSON batch of events per request. Only the
//! kinds the relay acts on are surfaced as [`InboundEvent`]s; anything
//! else (follow/unfollow, stickers, audio, …) is dropped silently.

use crate::policy::MediaKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// One actionable webhook event.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Text(TextEvent),
    Media(MediaEvent),
    Postback(PostbackEvent),
}

#[derive(Debug, Clone)]
pub struct TextEvent {
    pub message_id: String,
    pub sender_id: String,
    pub timestamp_millis: i64,
    pub reply_token: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct MediaEvent {
    pub kind: MediaKind,
    pub message_id: String,
    pub sender_id: String,
    pub timestamp_millis: i64,
    pub reply_token: String,
}

#[derive(Debug, Clone)]
pub struct PostbackEvent {
    pub sender_id: String,
    pub timestamp_millis: i64,
    pub reply_token: String,
    pub data: String,
}

#[derive(Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, rename = "replyToken")]
    reply_token: Option<String>,
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    postback: Option<RawPostback>,
}

#[derive(Deserialize)]
struct RawSource {
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawPostback {
    #[serde(default)]
    data: String,
}

/// Decode a raw webhook body into the events the relay handles. Unknown
/// event and message kinds are skipped, never an error.
pub fn decode_events(body: &[u8]) -> Result<Vec<InboundEvent>> {
    let payload: WebhookPayload =
        serde_json::from_slice(body).context("Failed to parse webhook payload")?;
    Ok(payload
        .events
        .into_iter()
        .filter_map(map_raw_event)
        .collect())
}

fn map_raw_event(raw: RawEvent) -> Option<InboundEvent> {
    let sender_id = raw
        .source
        .and_then(|s| s.user_id)
        .unwrap_or_default();
    let reply_token = raw.reply_token.unwrap_or_default();

    match raw.kind.as_str() {
        "message" => {
            let message = raw.message?;
            match message.kind.as_str() {
                "text" => Some(InboundEvent::Text(TextEvent {
                    message_id: message.id,
                    sender_id,
                    timestamp_millis: raw.timestamp,
                    reply_token,
                    body: message.text.unwrap_or_default(),
                })),
                "image" | "video" => {
                    let kind = if message.kind == "image" {
                        MediaKind::Image
                    } else {
                        MediaKind::Video
                    };
                    Some(InboundEvent::Media(MediaEvent {
                        kind,
                        message_id: message.id,
                        sender_id,
                        timestamp_millis: raw.timestamp,
                        reply_token,
                    }))
                }
                other => {
                    debug!("ignoring message kind: {}", other);
                    None
                }
            }
        }
        "postback" => Some(InboundEvent::Postback(PostbackEvent {
            sender_id,
            timestamp_millis: raw.timestamp,
            reply_token,
            data: raw.postback?.data,
        })),
        other => {
            debug!("ignoring event kind: {}", other);
            None
        }
    }
}

/// Decode postback `data` as a query string. Percent-encoded `=`/`&`
/// inside values survive, unlike the naive split-on-delimiters approach.
/// Later duplicates of a key win.
pub fn parse_postback_data(data: &str) -> HashMap<String, String> {
    form_urlencoded::parse(data.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
