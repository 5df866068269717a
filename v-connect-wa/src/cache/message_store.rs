use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::domain::MessageContent;

/// 协议层可回查的消息负载 / Message payload the protocol layer may ask for again
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: String,
    pub remote_jid: String,
    pub from_me: bool,
    pub timestamp: i64,
    pub content: MessageContent,
}

type Key = (String, String);

struct Inner {
    entries: HashMap<Key, StoredMessage>,
    order: VecDeque<Key>,
}

/// 固定容量消息存储；满时按插入顺序批量淘汰最旧条目
/// Fixed-capacity message store; when full, the oldest entries by insertion order are evicted in bulk
pub struct MessageStore {
    capacity: usize,
    evict_batch: usize,
    inner: Mutex<Inner>,
}

impl MessageStore {
    pub fn new(capacity: usize, evict_batch: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            evict_batch: evict_batch.clamp(1, capacity),
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
        }
    }

    /// 插入或替换；返回本次淘汰的条目数 / Insert or replace; returns how many entries were evicted
    pub fn insert(&self, message: StoredMessage) -> usize {
        let key = (message.id.clone(), message.remote_jid.clone());
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.entries.get_mut(&key) {
            *slot = message;
            return 0;
        }

        let mut evicted = 0;
        if inner.entries.len() >= self.capacity {
            let n = self.evict_batch.min(inner.order.len());
            let stale: Vec<Key> = inner.order.drain(..n).collect();
            for old in stale {
                inner.entries.remove(&old);
                evicted += 1;
            }
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(key, message);
        evicted
    }

    pub fn get(&self, id: &str, remote_jid: &str) -> Option<StoredMessage> {
        self.inner
            .lock()
            .entries
            .get(&(id.to_string(), remote_jid.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str) -> StoredMessage {
        StoredMessage {
            id: id.to_string(),
            remote_jid: "5511@s.whatsapp.net".to_string(),
            from_me: false,
            timestamp: 0,
            content: MessageContent::Text {
                text: format!("body {}", id),
            },
        }
    }

    #[test]
    fn test_bulk_eviction_drops_oldest_first() {
        let store = MessageStore::new(4, 2);
        for i in 0..4 {
            assert_eq!(store.insert(msg(&format!("m{}", i))), 0);
        }
        assert_eq!(store.insert(msg("m4")), 2);
        assert_eq!(store.len(), 3);
        assert!(store.get("m0", "5511@s.whatsapp.net").is_none());
        assert!(store.get("m1", "5511@s.whatsapp.net").is_none());
        assert!(store.get("m2", "5511@s.whatsapp.net").is_some());
        assert!(store.get("m4", "5511@s.whatsapp.net").is_some());
    }

    #[test]
    fn test_reinsert_same_key_replaces_without_growth() {
        let store = MessageStore::new(2, 1);
        store.insert(msg("m0"));
        let mut updated = msg("m0");
        updated.content = MessageContent::Text {
            text: "edited".to_string(),
        };
        store.insert(updated);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("m0", "5511@s.whatsapp.net").unwrap().content,
            MessageContent::Text {
                text: "edited".to_string()
            }
        );
    }

    #[test]
    fn test_key_includes_remote_jid() {
        let store = MessageStore::new(8, 1);
        let mut other = msg("m0");
        other.remote_jid = "5522@s.whatsapp.net".to_string();
        store.insert(msg("m0"));
        store.insert(other);
        assert_eq!(store.len(), 2);
    }
}
