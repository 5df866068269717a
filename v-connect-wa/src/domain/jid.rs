//! 网络标识符辅助函数 / Network identifier (JID) helpers
//!
//! 稳定标识: `<digits>@s.whatsapp.net`；隐私标识: `<digits>@lid`
//! Stable ids: `<digits>@s.whatsapp.net`; privacy-preserving ids: `<digits>@lid`

pub const USER_SERVER: &str = "s.whatsapp.net";
pub const LID_SERVER: &str = "lid";
pub const GROUP_SERVER: &str = "g.us";

/// 分离 user 与 server 部分，并去掉设备后缀 / Split user and server, dropping device suffix
fn split(jid: &str) -> (&str, &str) {
    let (user, server) = jid.split_once('@').unwrap_or((jid, ""));
    let user = user.split(':').next().unwrap_or(user);
    (user, server)
}

pub fn user_part(jid: &str) -> &str {
    split(jid).0
}

pub fn is_lid(jid: &str) -> bool {
    split(jid).1 == LID_SERVER
}

pub fn is_group(jid: &str) -> bool {
    split(jid).1 == GROUP_SERVER
}

/// 群组、广播、频道流量不进入会话管理 / Group, broadcast and newsletter traffic is filtered out
pub fn is_filtered(jid: &str) -> bool {
    let server = split(jid).1;
    server == GROUP_SERVER || server == "broadcast" || server == "newsletter"
}

/// 去掉设备后缀后的规范形式 / Canonical form without device suffix
pub fn normalize(jid: &str) -> String {
    let (user, server) = split(jid);
    if server.is_empty() {
        user.to_string()
    } else {
        format!("{}@{}", user, server)
    }
}

/// 从稳定标识提取电话号码 / Extract a phone number from a stable id
pub fn phone_number(jid: &str) -> Option<String> {
    let (user, server) = split(jid);
    if server != USER_SERVER || user.is_empty() || !user.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(user.to_string())
}

/// 将发送目标规范化为 JID；裸号码补全服务器后缀
/// Normalize a send target to a JID; bare numbers get the user server
///
/// 裸号码只允许数字与常见分隔符 / Bare numbers allow only digits and common separators
pub fn to_send_target(to: &str) -> Option<String> {
    let to = to.trim();
    if to.contains('@') {
        return Some(normalize(to));
    }
    if !to
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')' | '.'))
    {
        return None;
    }
    let digits: String = to.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("{}@{}", digits, USER_SERVER))
}
