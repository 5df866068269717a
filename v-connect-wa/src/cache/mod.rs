//! 协议对象缓存 / Protocol object caches
//!
//! 每个缓存各自持锁、各自TTL；均为实例私有。
//! Each cache owns its lock and TTL; all are private to one instance.

pub mod alias;
pub mod directory;
pub mod group;
pub mod message_store;
pub mod profile;

pub use alias::{AliasCache, AliasOutcome};
pub use directory::ContactDirectory;
pub use group::GroupMetadataCache;
pub use message_store::{MessageStore, StoredMessage};
pub use profile::ProfilePictureCache;

use std::time::Duration;

use crate::config::CacheConfig;

/// 单个实例持有的缓存集合 / Set of caches owned by one instance
pub struct InstanceCaches {
    pub aliases: AliasCache,
    pub contacts: ContactDirectory,
    pub groups: GroupMetadataCache,
    pub pictures: ProfilePictureCache,
    pub messages: MessageStore,
}

impl InstanceCaches {
    pub fn new(cfg: &CacheConfig) -> Self {
        Self {
            aliases: AliasCache::new(),
            contacts: ContactDirectory::new(),
            groups: GroupMetadataCache::new(Duration::from_millis(cfg.group_ttl_ms)),
            pictures: ProfilePictureCache::new(Duration::from_millis(cfg.profile_ttl_ms)),
            messages: MessageStore::new(cfg.message_capacity, cfg.message_evict_batch),
        }
    }
}
