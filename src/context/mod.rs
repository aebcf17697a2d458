//! Shared mutable relay state, owned explicitly and injected into the
//! dispatcher instead of living in process-wide globals.
//!
//! Everything here is guarded by a `std::sync::Mutex` — the platform may
//! deliver event batches concurrently, including retries racing their
//! originals, so lost updates on bare maps would reopen the duplicate
//! window.

use crate::policy::MediaKind;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Dedup sets, sequence counters and the optional sender→album map.
///
/// The seen-id sets are admit-once for the process lifetime: no eviction,
/// no TTL, no cross-process sharing. Memory grows with message volume
/// until restart, and a restart permits re-upload of a redelivered event —
/// the remote name-based existence check is the second line of defense.
#[derive(Default)]
pub struct RelayContext {
    seen_images: Mutex<HashSet<String>>,
    seen_videos: Mutex<HashSet<String>>,
    sequences: Mutex<HashMap<(String, String), u32>>,
    albums: Mutex<HashMap<String, String>>,
}

impl RelayContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn seen_set(&self, kind: MediaKind) -> &Mutex<HashSet<String>> {
        match kind {
            MediaKind::Image => &self.seen_images,
            MediaKind::Video => &self.seen_videos,
        }
    }

    pub fn already_seen(&self, kind: MediaKind, message_id: &str) -> bool {
        self.seen_set(kind)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(message_id)
    }

    /// Record a message id as handled. Returns `false` if it was already
    /// present — check-and-insert is atomic under the lock, so two racing
    /// deliveries of the same id admit exactly one.
    pub fn mark_seen(&self, kind: MediaKind, message_id: &str) -> bool {
        self.seen_set(kind)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(message_id.to_string())
    }

    /// Next per-`(sender, minute)` sequence number, starting at 1. Only
    /// used as the filename discriminator for events lacking a message id;
    /// resets on restart.
    pub fn next_sequence(&self, sender_id: &str, minute_key: &str) -> u32 {
        let mut sequences = self
            .sequences
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let counter = sequences
            .entry((sender_id.to_string(), minute_key.to_string()))
            .or_insert(0);
        *counter += 1;
        *counter
    }

    pub fn set_album(&self, sender_id: &str, full_album_name: &str) {
        self.albums
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(sender_id.to_string(), full_album_name.to_string());
    }

    pub fn active_album(&self, sender_id: &str) -> Option<String> {
        self.albums
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(sender_id)
            .cloned()
    }
}
