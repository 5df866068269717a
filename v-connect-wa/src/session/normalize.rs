//! 原始协议消息 → 消息信封 / Raw protocol message → message envelope

use tracing::trace;

use crate::cache::{AliasCache, ContactDirectory, StoredMessage};
use crate::domain::{jid, MessageEnvelope};
use crate::protocol::RawMessage;

/// 归一化结果：对外信封 + 供协议回查的负载
/// Normalization output: outbound envelope plus the payload kept for protocol lookups
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub envelope: MessageEnvelope,
    pub stored: StoredMessage,
}

/// 群组/广播/频道、无内容消息返回 None
/// Returns None for group, broadcast, newsletter and content-less messages
pub fn normalize_message(
    instance_id: &str,
    raw: &RawMessage,
    historical: bool,
    aliases: &AliasCache,
    contacts: &ContactDirectory,
) -> Option<Normalized> {
    let remote = jid::normalize(&raw.key.remote_jid);
    if jid::is_filtered(&remote) {
        trace!(instance_id, %remote, "skipping filtered chat");
        return None;
    }
    let content = match &raw.content {
        Some(content) => content.clone(),
        None => {
            trace!(instance_id, id = %raw.key.id, "skipping message without content");
            return None;
        }
    };

    // 只有恰好一侧为 lid 时才是别名对 / Only a pair with exactly one lid side is an alias
    if let Some(alt) = raw.key.remote_jid_alt.as_deref() {
        if jid::is_lid(&remote) != jid::is_lid(alt) {
            aliases.record(&remote, alt);
        }
    }
    let (remote_jid, remote_resolved) = aliases.resolve(&remote);

    let display_name = display_name(raw, &remote, &remote_jid, contacts);
    let envelope = MessageEnvelope {
        id: raw.key.id.clone(),
        instance_id: instance_id.to_string(),
        from_me: raw.key.from_me,
        remote_jid: remote_jid.clone(),
        remote_resolved,
        body: content.render(),
        timestamp: raw.timestamp,
        historical,
        display_name,
    };
    let stored = StoredMessage {
        id: raw.key.id.clone(),
        remote_jid: remote,
        from_me: raw.key.from_me,
        timestamp: raw.timestamp,
        content,
    };
    Some(Normalized { envelope, stored })
}

fn display_name(
    raw: &RawMessage,
    remote: &str,
    resolved: &str,
    contacts: &ContactDirectory,
) -> String {
    // 自己发出的消息，push_name 是本账号名 / On own messages push_name is our own name
    let push_name = if raw.key.from_me {
        None
    } else {
        raw.push_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    };
    push_name
        .or_else(|| contacts.name_of(resolved))
        .or_else(|| contacts.name_of(remote))
        .unwrap_or_else(|| jid::user_part(resolved).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageContent;
    use crate::protocol::MessageKey;

    fn raw(remote: &str, alt: Option<&str>, push_name: Option<&str>) -> RawMessage {
        RawMessage {
            key: MessageKey {
                id: "3EB0AA".to_string(),
                remote_jid: remote.to_string(),
                remote_jid_alt: alt.map(str::to_string),
                from_me: false,
                participant: None,
            },
            push_name: push_name.map(str::to_string),
            timestamp: 1_700_000_000,
            content: Some(MessageContent::Text {
                text: "oi".to_string(),
            }),
        }
    }

    #[test]
    fn test_filtered_and_empty_messages_are_dropped() {
        let aliases = AliasCache::new();
        let contacts = ContactDirectory::new();
        assert!(normalize_message("inst_a", &raw("1203@g.us", None, None), false, &aliases, &contacts).is_none());
        assert!(normalize_message("inst_a", &raw("status@broadcast", None, None), false, &aliases, &contacts).is_none());

        let mut stub = raw("5511@s.whatsapp.net", None, None);
        stub.content = None;
        assert!(normalize_message("inst_a", &stub, false, &aliases, &contacts).is_none());
    }

    #[test]
    fn test_lid_with_alt_resolves_to_phone_id() {
        let aliases = AliasCache::new();
        let contacts = ContactDirectory::new();
        let out = normalize_message(
            "inst_a",
            &raw("999@lid", Some("5511@s.whatsapp.net"), Some("Ana")),
            true,
            &aliases,
            &contacts,
        )
        .unwrap();
        assert_eq!(out.envelope.remote_jid, "5511@s.whatsapp.net");
        assert!(out.envelope.remote_resolved);
        assert!(out.envelope.historical);
        assert_eq!(out.envelope.display_name, "Ana");
        assert_eq!(out.envelope.body, "oi");
        // 存储按原始会话键 / Stored under the original chat key
        assert_eq!(out.stored.remote_jid, "999@lid");
    }

    #[test]
    fn test_alt_that_is_not_an_alias_is_ignored() {
        let aliases = AliasCache::new();
        let contacts = ContactDirectory::new();
        let out = normalize_message(
            "inst_a",
            &raw("5511@s.whatsapp.net", Some("5511:3@s.whatsapp.net"), None),
            false,
            &aliases,
            &contacts,
        )
        .unwrap();
        assert_eq!(out.envelope.remote_jid, "5511@s.whatsapp.net");
        assert!(aliases.is_empty());
    }

    #[test]
    fn test_unknown_lid_stays_unresolved_and_falls_back_to_user_part() {
        let aliases = AliasCache::new();
        let contacts = ContactDirectory::new();
        let out = normalize_message("inst_a", &raw("777@lid", None, None), false, &aliases, &contacts).unwrap();
        assert_eq!(out.envelope.remote_jid, "777@lid");
        assert!(!out.envelope.remote_resolved);
        assert_eq!(out.envelope.display_name, "777");
    }

    #[test]
    fn test_directory_name_used_when_push_name_missing() {
        let aliases = AliasCache::new();
        let contacts = ContactDirectory::new();
        contacts.upsert("5511@s.whatsapp.net", "Bruno");
        let mut own = raw("5511@s.whatsapp.net", None, Some("Me"));
        own.key.from_me = true;
        let out = normalize_message("inst_a", &own, false, &aliases, &contacts).unwrap();
        assert!(out.envelope.from_me);
        assert_eq!(out.envelope.display_name, "Bruno");
    }
}
