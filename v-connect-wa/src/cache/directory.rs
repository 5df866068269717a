use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::jid;

/// 联系人名称目录（来自协议层通讯录同步）
/// Contact name directory, fed by the protocol layer's contact sync
#[derive(Default)]
pub struct ContactDirectory {
    names: RwLock<HashMap<String, String>>,
}

impl ContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 空名称不覆盖已知名称 / Blank names never overwrite a known one
    pub fn upsert(&self, party: &str, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.names
            .write()
            .insert(jid::normalize(party), name.to_string());
    }

    pub fn name_of(&self, party: &str) -> Option<String> {
        self.names.read().get(&jid::normalize(party)).cloned()
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
