//! Storage channel registry.
//!
//! Seeded from configuration and grown by the registration handshake. Reads
//! hand out a sorted copy so a run keeps a stable channel list even while new
//! channels are registered.

use bridge_traits::ChatId;
use parking_lot::RwLock;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: RwLock<BTreeSet<ChatId>>,
}

impl ChannelRegistry {
    pub fn new<I>(initial: I) -> Self
    where
        I: IntoIterator<Item = ChatId>,
    {
        Self {
            channels: RwLock::new(initial.into_iter().collect()),
        }
    }

    /// Add a channel. Returns `false` when it was already known.
    pub fn register(&self, channel: ChatId) -> bool {
        self.channels.write().insert(channel)
    }

    pub fn contains(&self, channel: &ChatId) -> bool {
        self.channels.read().contains(channel)
    }

    pub fn snapshot(&self) -> Vec<ChatId> {
        self.channels.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_has_set_semantics() {
        let registry = ChannelRegistry::new(vec![ChatId::from("-100")]);

        assert!(!registry.register(ChatId::from("-100")));
        assert!(registry.register(ChatId::from("-200")));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&ChatId::from("-200")));
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = ChannelRegistry::default();
        assert!(registry.is_empty());

        registry.register(ChatId::from("b"));
        registry.register(ChatId::from("a"));

        assert_eq!(registry.snapshot(), vec![ChatId::from("a"), ChatId::from("b")]);
    }
}
