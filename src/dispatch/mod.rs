//! Event dispatcher: routes decoded webhook events to their handlers.
//!
//! Each event is handled in isolation — a failing handler is logged and
//! the rest of the batch still runs, so one bad event can never suppress
//! the `OK` the platform expects. All collaborators sit behind trait
//! seams and are injected, along with the shared [`RelayContext`].

pub mod command;

use crate::context::RelayContext;
use crate::drive::MediaStore;
use crate::errors::RelayError;
use crate::events::{InboundEvent, MediaEvent, PostbackEvent, TextEvent, parse_postback_data};
use crate::line::LineApi;
use crate::persist::{LocalLog, MessageStore};
use crate::policy;
use chrono::Local;
use command::AlbumCommand;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct Dispatcher {
    ctx: RelayContext,
    line: Arc<dyn LineApi>,
    media: Arc<dyn MediaStore>,
    store: Arc<dyn MessageStore>,
    local_log: LocalLog,
    user_mapping: HashMap<String, String>,
    persist_albums: bool,
}

impl Dispatcher {
    pub fn new(
        ctx: RelayContext,
        line: Arc<dyn LineApi>,
        media: Arc<dyn MediaStore>,
        store: Arc<dyn MessageStore>,
        local_log: LocalLog,
        user_mapping: HashMap<String, String>,
        persist_albums: bool,
    ) -> Self {
        Self {
            ctx,
            line,
            media,
            store,
            local_log,
            user_mapping,
            persist_albums,
        }
    }

    /// Handle a decoded batch. Never fails: per-event errors are logged
    /// and the remaining events still run.
    pub async fn dispatch(&self, events: Vec<InboundEvent>) {
        for event in events {
            if let Err(e) = self.handle_event(event).await {
                error!("event handling failed: {}", e);
            }
        }
    }

    async fn handle_event(&self, event: InboundEvent) -> Result<(), RelayError> {
        match event {
            InboundEvent::Text(ev) => self.handle_text(ev).await,
            InboundEvent::Media(ev) => self.handle_media(ev).await,
            InboundEvent::Postback(ev) => self.handle_postback(ev).await,
        }
    }

    async fn handle_text(&self, ev: TextEvent) -> Result<(), RelayError> {
        let text = ev.body.trim().to_string();
        info!("received text message from user {}", ev.sender_id);

        match command::parse_album_command(&text) {
            Some(Ok(AlbumCommand::Usage)) => {
                self.reply(&ev.reply_token, command::REPLY_USAGE).await;
                return Ok(());
            }
            Some(Ok(AlbumCommand::Create { date, name })) => {
                let full_album_name = AlbumCommand::full_album_name(&date, &name);
                self.register_album(&ev.sender_id, &full_album_name);
                self.reply(&ev.reply_token, &format!("相簿已建立：{}", full_album_name))
                    .await;
                return Ok(());
            }
            Some(Err(e)) => {
                // User-facing parse failure: corrective reply, no state change
                debug!("album command rejected: {:?}", text);
                if let Some(reply) = e.user_reply() {
                    self.reply(&ev.reply_token, reply).await;
                }
                return Ok(());
            }
            None => {}
        }

        let dt = policy::local_datetime(ev.timestamp_millis);
        let display_name = self.resolve_display_name(&ev.sender_id).await;

        // Local and remote are independently best-effort; one failing
        // must not stop the other, so the copies can diverge.
        if let Err(e) = self.local_log.append(dt, &display_name, &text) {
            warn!("local log append failed: {}", e);
        }
        if let Err(e) = self
            .store
            .insert(dt, &ev.sender_id, &display_name, &text)
            .await
        {
            warn!("database insert failed: {}", e);
        }
        Ok(())
    }

    async fn handle_media(&self, ev: MediaEvent) -> Result<(), RelayError> {
        let label = ev.kind.label();
        // Dedup is keyed by the platform message id; an event without one
        // has nothing to dedup on and falls through to the sequence path.
        if !ev.message_id.is_empty() && !self.ctx.mark_seen(ev.kind, &ev.message_id) {
            info!(
                "{} messageId={} already processed, skipping upload",
                label, ev.message_id
            );
            return Ok(());
        }

        let content = self.line.get_message_content(&ev.message_id).await?;
        let dt = policy::local_datetime(ev.timestamp_millis);
        let display_name =
            policy::sanitize_display_name(&self.resolve_display_name(&ev.sender_id).await);

        let discriminator = if ev.message_id.is_empty() {
            let sequence = self
                .ctx
                .next_sequence(&ev.sender_id, &policy::minute_key(dt));
            policy::sequence_discriminator(sequence)
        } else {
            ev.message_id.clone()
        };
        let filename = policy::media_filename(&display_name, dt, &discriminator, ev.kind);
        let folder = self.media_folder(&ev.sender_id, dt);

        match self
            .media
            .upload(content, &filename, &folder, ev.kind.mime_type())
            .await
        {
            Ok(file_id) => info!("{} uploaded to Drive with file id {}", label, file_id),
            // Non-fatal: absent id, no retry
            Err(e) => warn!("failed to upload {} {}: {}", label, filename, e),
        }
        Ok(())
    }

    async fn handle_postback(&self, ev: PostbackEvent) -> Result<(), RelayError> {
        let params = parse_postback_data(&ev.data);
        if params.get("action").map(String::as_str) != Some("create_album") {
            debug!("ignoring postback action: {:?}", params.get("action"));
            return Ok(());
        }

        let album_date = params
            .get("album_date")
            .cloned()
            .unwrap_or_else(|| policy::day_folder(Local::now()));
        let album_name = params
            .get("album_name")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        let full_album_name = AlbumCommand::full_album_name(&album_date, &album_name);
        self.register_album(&ev.sender_id, &full_album_name);
        self.reply(&ev.reply_token, &format!("相簿已建立：{}", full_album_name))
            .await;
        Ok(())
    }

    fn register_album(&self, sender_id: &str, full_album_name: &str) {
        if self.persist_albums {
            self.ctx.set_album(sender_id, full_album_name);
        }
        info!("user {} created album: {}", sender_id, full_album_name);
    }

    /// Destination folder for a media event: the sender's active album
    /// when album persistence is on, otherwise the day folder.
    fn media_folder(&self, sender_id: &str, dt: chrono::DateTime<Local>) -> String {
        if self.persist_albums {
            if let Some(album) = self.ctx.active_album(sender_id) {
                return album;
            }
        }
        policy::day_folder(dt)
    }

    /// Static mapping first, then a live profile lookup. Lookup failures
    /// fall back to the sentinel and are logged, never propagated.
    async fn resolve_display_name(&self, sender_id: &str) -> String {
        if let Some(name) = self.user_mapping.get(sender_id) {
            return name.clone();
        }
        match self.line.get_profile(sender_id).await {
            Ok(profile) => profile.display_name,
            Err(e) => {
                error!("error fetching profile for user {}: {}", sender_id, e);
                policy::UNKNOWN_DISPLAY_NAME.to_string()
            }
        }
    }

    /// Fire-and-forget reply; the token is single-use and there is no
    /// retry, so failures are only logged.
    async fn reply(&self, reply_token: &str, text: &str) {
        if let Err(e) = self.line.reply_text(reply_token, text).await {
            warn!("reply failed: {}", e);
        }
    }
}
