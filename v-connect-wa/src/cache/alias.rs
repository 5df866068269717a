use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::jid;

/// 记录别名的结果 / Outcome of recording an alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasOutcome {
    Recorded,
    /// 已存在相同映射 / Same mapping already known
    Known,
    /// 与已有映射冲突，已拒绝 / Contradicts an existing mapping, rejected
    Conflict { existing: String },
    /// 不是 lid/pn 对，忽略 / Not a lid/pn pair, ignored
    NotAPair,
}

#[derive(Default)]
struct AliasTable {
    lid_to_pn: HashMap<String, String>,
    pn_to_lid: HashMap<String, String>,
}

/// 隐私标识(lid) ↔ 稳定标识(pn) 双向映射；只追加，除非显式失效
/// Bidirectional lid ↔ pn mapping; append-only unless explicitly invalidated
#[derive(Default)]
pub struct AliasCache {
    table: RwLock<AliasTable>,
}

impl AliasCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录映射；参数顺序不敏感 / Record a mapping; argument order does not matter
    pub fn record(&self, a: &str, b: &str) -> AliasOutcome {
        let (lid, pn) = match (jid::is_lid(a), jid::is_lid(b)) {
            (true, false) => (jid::normalize(a), jid::normalize(b)),
            (false, true) => (jid::normalize(b), jid::normalize(a)),
            _ => {
                debug!(a, b, "not a lid/pn pair, ignoring");
                return AliasOutcome::NotAPair;
            }
        };

        let mut table = self.table.write();
        if let Some(existing) = table.lid_to_pn.get(&lid) {
            if *existing == pn {
                return AliasOutcome::Known;
            }
            warn!(%lid, %pn, %existing, "alias conflicts with known mapping, keeping existing");
            return AliasOutcome::Conflict {
                existing: existing.clone(),
            };
        }
        if let Some(existing) = table.pn_to_lid.get(&pn) {
            warn!(%lid, %pn, %existing, "alias conflicts with known mapping, keeping existing");
            return AliasOutcome::Conflict {
                existing: existing.clone(),
            };
        }
        table.lid_to_pn.insert(lid.clone(), pn.clone());
        table.pn_to_lid.insert(pn, lid);
        AliasOutcome::Recorded
    }

    /// 协议层显式失效（如成员离开/重新加入）/ Explicit invalidation from the protocol layer
    pub fn invalidate(&self, party: &str) {
        let party = jid::normalize(party);
        let mut table = self.table.write();
        if let Some(pn) = table.lid_to_pn.remove(&party) {
            table.pn_to_lid.remove(&pn);
        }
        if let Some(lid) = table.pn_to_lid.remove(&party) {
            table.lid_to_pn.remove(&lid);
        }
    }

    pub fn pn_for(&self, lid: &str) -> Option<String> {
        self.table.read().lid_to_pn.get(&jid::normalize(lid)).cloned()
    }

    pub fn lid_for(&self, pn: &str) -> Option<String> {
        self.table.read().pn_to_lid.get(&jid::normalize(pn)).cloned()
    }

    /// 优先返回稳定标识；第二项表示是否已解析
    /// Prefer the stable id; the flag tells whether it was resolved
    pub fn resolve(&self, party: &str) -> (String, bool) {
        if jid::is_lid(party) {
            match self.pn_for(party) {
                Some(pn) => (pn, true),
                None => (jid::normalize(party), false),
            }
        } else {
            (jid::normalize(party), true)
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().lid_to_pn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_resolve_both_directions() {
        let cache = AliasCache::new();
        assert_eq!(
            cache.record("5511@s.whatsapp.net", "999@lid"),
            AliasOutcome::Recorded
        );
        assert_eq!(cache.pn_for("999@lid").as_deref(), Some("5511@s.whatsapp.net"));
        assert_eq!(cache.lid_for("5511@s.whatsapp.net").as_deref(), Some("999@lid"));
        assert_eq!(cache.resolve("999:4@lid"), ("5511@s.whatsapp.net".to_string(), true));
        assert_eq!(cache.record("999@lid", "5511@s.whatsapp.net"), AliasOutcome::Known);
    }

    #[test]
    fn test_non_pairs_are_ignored() {
        let cache = AliasCache::new();
        assert_eq!(
            cache.record("5511@s.whatsapp.net", "5511:3@s.whatsapp.net"),
            AliasOutcome::NotAPair
        );
        assert_eq!(cache.record("1@lid", "2@lid"), AliasOutcome::NotAPair);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unresolved_lid_is_flagged() {
        let cache = AliasCache::new();
        assert_eq!(cache.resolve("777@lid"), ("777@lid".to_string(), false));
    }

    #[test]
    fn test_conflict_keeps_existing_until_invalidated() {
        let cache = AliasCache::new();
        cache.record("999@lid", "5511@s.whatsapp.net");
        assert_eq!(
            cache.record("999@lid", "5522@s.whatsapp.net"),
            AliasOutcome::Conflict {
                existing: "5511@s.whatsapp.net".to_string()
            }
        );
        assert_eq!(cache.pn_for("999@lid").as_deref(), Some("5511@s.whatsapp.net"));

        cache.invalidate("999@lid");
        assert!(cache.lid_for("5511@s.whatsapp.net").is_none());
        assert_eq!(
            cache.record("999@lid", "5522@s.whatsapp.net"),
            AliasOutcome::Recorded
        );
        assert_eq!(cache.len(), 1);
    }
}
