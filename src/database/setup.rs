//! Pending setup conversations, one per sender.

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};

use super::models::{PendingSetup, SetupStep};

/// Setup flows waiting on the sender's next message.
///
/// Keyed by clean sender id, so starting a new flow replaces any older one.
/// Abandoned flows expire after the idle window.
#[derive(Clone)]
pub struct PendingSetups {
    cache: TypedCache<String, PendingSetup>,
}

impl PendingSetups {
    pub fn new(cache_registry: &CacheRegistry) -> Self {
        let cache = cache_registry.get_or_create("pending_setups", CacheConfig::pending_input());
        Self { cache }
    }

    pub fn begin(&self, sender: &str, setup: PendingSetup) {
        self.cache.insert(sender.to_string(), setup);
    }

    /// The sender's pending flow, if it belongs to this chat.
    pub fn get(&self, sender: &str, chat_id: &str) -> Option<PendingSetup> {
        self.cache
            .get(&sender.to_string())
            .filter(|setup| setup.chat_id == chat_id)
    }

    pub fn advance(&self, sender: &str, step: SetupStep) {
        if let Some(mut setup) = self.cache.get(&sender.to_string()) {
            setup.step = step;
            self.cache.insert(sender.to_string(), setup);
        }
    }

    pub fn finish(&self, sender: &str) -> Option<PendingSetup> {
        self.cache.take(&sender.to_string())
    }
}
