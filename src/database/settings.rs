//! In-memory settings stores.
//!
//! Chat settings live in a `DashMap` of shared records: a record is created
//! on first access and never evicted. Writes replace the whole record
//! (last write wins). Bot settings are a single process-wide value.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::models::{BotSettings, ChatSettings, Toggle};

/// Per-chat moderation settings.
#[derive(Clone, Default)]
pub struct SettingsStore {
    chats: Arc<DashMap<String, Arc<ChatSettings>>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for a chat, created with defaults on first access.
    ///
    /// Until the next write, repeated calls return the same `Arc`.
    pub fn get(&self, chat_id: &str) -> Arc<ChatSettings> {
        if let Some(existing) = self.chats.get(chat_id) {
            return Arc::clone(existing.value());
        }

        let entry = self.chats.entry(chat_id.to_string()).or_insert_with(|| {
            debug!("Creating default settings for chat {}", chat_id);
            Arc::new(ChatSettings::new(chat_id))
        });
        Arc::clone(entry.value())
    }

    /// Replace a chat's settings.
    pub fn upsert(&self, settings: ChatSettings) -> Arc<ChatSettings> {
        let settings = Arc::new(settings);
        self.chats
            .insert(settings.chat_id.clone(), Arc::clone(&settings));
        settings
    }

    /// Fetch-or-create, mutate a copy, store it back.
    ///
    /// `f` runs under the map's shard lock and must not call back into the store.
    pub fn update<R>(&self, chat_id: &str, f: impl FnOnce(&mut ChatSettings) -> R) -> R {
        let mut entry = self
            .chats
            .entry(chat_id.to_string())
            .or_insert_with(|| Arc::new(ChatSettings::new(chat_id)));

        let mut next = ChatSettings::clone(entry.value());
        let result = f(&mut next);
        *entry.value_mut() = Arc::new(next);
        result
    }

    pub fn delete(&self, chat_id: &str) -> bool {
        self.chats.remove(chat_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }
}

/// Process-wide bot settings.
#[derive(Clone)]
pub struct BotSettingsStore {
    inner: Arc<RwLock<BotSettings>>,
}

impl BotSettingsStore {
    pub fn new(settings: BotSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn snapshot(&self) -> BotSettings {
        self.inner.read().clone()
    }

    pub fn prefix(&self) -> String {
        self.inner.read().prefix.clone()
    }

    pub fn get(&self, toggle: Toggle) -> bool {
        self.inner.read().get(toggle)
    }

    /// Flip a switch; returns the value now stored.
    pub fn toggle(&self, toggle: Toggle) -> bool {
        self.inner.write().toggle(toggle)
    }

    /// Turn a switch on and empty the status target list in one write.
    pub fn watch_all_statuses(&self) {
        let mut settings = self.inner.write();
        settings.set(Toggle::AutoStatus, true);
        settings.status_targets.clear();
    }

    pub fn set_prefix(&self, prefix: &str) {
        self.inner.write().prefix = prefix.to_string();
    }

    /// Returns false if the target was already present.
    pub fn add_status_target(&self, id: &str) -> bool {
        let mut settings = self.inner.write();
        if settings.status_targets.iter().any(|t| t == id) {
            return false;
        }
        settings.status_targets.push(id.to_string());
        true
    }

    /// Returns false if the target was not present.
    pub fn remove_status_target(&self, id: &str) -> bool {
        let mut settings = self.inner.write();
        let before = settings.status_targets.len();
        settings.status_targets.retain(|t| t != id);
        settings.status_targets.len() != before
    }

    pub fn status_targets(&self) -> Vec<String> {
        self.inner.read().status_targets.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Mode;

    #[test]
    fn test_unseen_chat_gets_defaults_and_same_instance() {
        let store = SettingsStore::new();
        let first = store.get("1203@g.us");
        assert_eq!(first.mode, Mode::Public);
        assert!(!first.anti_link && !first.anti_image && !first.anti_video && !first.anti_sticker);

        let second = store.get("1203@g.us");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_creates_and_replaces() {
        let store = SettingsStore::new();
        let mode = store.update("g", |s| {
            s.mode = Mode::Admin;
            s.mode
        });
        assert_eq!(mode, Mode::Admin);
        assert_eq!(store.get("g").mode, Mode::Admin);

        let mut replaced = ChatSettings::new("g");
        replaced.anti_video = true;
        store.upsert(replaced);
        assert!(store.get("g").anti_video);
        assert_eq!(store.get("g").mode, Mode::Public);

        assert!(store.delete("g"));
        assert!(!store.delete("g"));
    }

    #[test]
    fn test_toggle_twice_restores_value() {
        let store = BotSettingsStore::new(BotSettings::default());
        let original = store.get(Toggle::AutoRead);

        let first = store.toggle(Toggle::AutoRead);
        assert_eq!(first, !original);
        assert_eq!(store.get(Toggle::AutoRead), first);

        let second = store.toggle(Toggle::AutoRead);
        assert_eq!(second, original);
        assert_eq!(store.snapshot().auto_read, original);
    }

    #[test]
    fn test_watch_all_statuses_concurrently_stays_on() {
        let store = BotSettingsStore::new(BotSettings::default());
        store.add_status_target("222");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.watch_all_statuses())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(store.get(Toggle::AutoStatus));
        assert!(store.status_targets().is_empty());
    }

    #[test]
    fn test_status_targets() {
        let store = BotSettingsStore::new(BotSettings::default());
        assert!(store.snapshot().watches_status_of("111"));

        assert!(store.add_status_target("222"));
        assert!(!store.add_status_target("222"));
        assert!(!store.snapshot().watches_status_of("111"));
        assert!(store.snapshot().watches_status_of("222"));

        assert!(store.remove_status_target("222"));
        assert!(!store.remove_status_target("222"));
        assert!(store.status_targets().is_empty());
    }
}
