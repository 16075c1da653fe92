//! Cache store
//!
//! Entities observed on the gateway, keyed the way the dispatcher sees them.
//! Shared by every shard of a client; each mapping serializes its own writers.

use cord_core::{Message, Snowflake, User};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Entry counts of the three mappings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub users: usize,
    pub messages: usize,
    pub guilds: usize,
}

/// Process-wide entity cache
///
/// Entries exist only once their creation event was seen, and are replaced
/// wholesale when seen again.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Users by id
    users: DashMap<Snowflake, User>,

    /// Messages by `"channel_id:message_id"`
    messages: DashMap<String, Message>,

    /// Raw guild payloads by id
    guilds: DashMap<Snowflake, Value>,
}

impl CacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new cache store wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // === Users ===

    /// Insert or replace a user, returning the previous entry
    pub fn insert_user(&self, user: User) -> Option<User> {
        self.users.insert(user.id, user)
    }

    pub fn user(&self, id: Snowflake) -> Option<User> {
        self.users.get(&id).map(|r| r.clone())
    }

    // === Messages ===

    /// Insert or replace a message under its composite key
    pub fn insert_message(&self, message: Message) -> Option<Message> {
        self.messages.insert(message.cache_key(), message)
    }

    /// Look up a message by composite key (`"channel_id:message_id"`)
    pub fn message(&self, key: &str) -> Option<Message> {
        self.messages.get(key).map(|r| r.clone())
    }

    /// Look up a message by channel and message id
    pub fn channel_message(&self, channel_id: Snowflake, message_id: Snowflake) -> Option<Message> {
        self.message(&Message::key(channel_id, message_id))
    }

    // === Guilds ===

    /// Insert or replace a raw guild payload
    pub fn insert_guild(&self, id: Snowflake, payload: Value) -> Option<Value> {
        self.guilds.insert(id, payload)
    }

    pub fn guild(&self, id: Snowflake) -> Option<Value> {
        self.guilds.get(&id).map(|r| r.clone())
    }

    // === Statistics ===

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            users: self.users.len(),
            messages: self.messages.len(),
            guilds: self.guilds.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats() == CacheStats::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cord_core::ConnectionHandle;
    use serde_json::json;

    fn user(id: u64, name: &str) -> User {
        User::from_payload(ConnectionHandle::unsharded(), &json!({"id": id, "username": name}))
            .unwrap()
    }

    fn message(channel: u64, id: u64, content: &str) -> Message {
        Message::from_payload(
            ConnectionHandle::unsharded(),
            &json!({
                "id": id.to_string(),
                "channel_id": channel.to_string(),
                "author": {"id": "1", "username": "a"},
                "content": content,
                "timestamp": "2024-01-01T00:00:00+00:00"
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_users() {
        let cache = CacheStore::new();
        assert!(cache.is_empty());

        assert!(cache.insert_user(user(1, "first")).is_none());
        let previous = cache.insert_user(user(1, "renamed")).unwrap();
        assert_eq!(previous.username, "first");
        assert_eq!(cache.user(Snowflake::new(1)).unwrap().username, "renamed");
        assert!(cache.user(Snowflake::new(2)).is_none());
    }

    #[test]
    fn test_messages_keyed_by_channel_and_id() {
        let cache = CacheStore::new();
        cache.insert_message(message(5, 9, "first"));
        cache.insert_message(message(5, 9, "second"));
        cache.insert_message(message(6, 9, "other channel"));

        assert_eq!(cache.stats().messages, 2);
        assert_eq!(cache.message("5:9").unwrap().content, "second");
        assert_eq!(
            cache
                .channel_message(Snowflake::new(6), Snowflake::new(9))
                .unwrap()
                .content,
            "other channel"
        );
    }

    #[test]
    fn test_guilds() {
        let cache = CacheStore::new();
        cache.insert_guild(Snowflake::new(10), json!({"id": "10", "name": "a"}));
        cache.insert_guild(Snowflake::new(10), json!({"id": "10", "name": "b"}));

        assert_eq!(cache.guild(Snowflake::new(10)).unwrap()["name"], "b");
        assert_eq!(
            cache.stats(),
            CacheStats {
                users: 0,
                messages: 0,
                guilds: 1
            }
        );
    }

    #[test]
    fn test_concurrent_writers() {
        let cache = CacheStore::new_shared();
        let handles: Vec<_> = (0..4u64)
            .map(|shard| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100u64 {
                        cache.insert_user(user(shard * 1000 + i, "u"));
                        cache.insert_message(message(shard, i, "m"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.stats().users, 400);
        assert_eq!(cache.stats().messages, 400);
    }
}
