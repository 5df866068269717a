//! 协议客户端接缝 / Protocol client seam
//!
//! 会话层只依赖这里的trait；生产实现为 [`bridge::BridgeConnector`]，
//! 测试使用脚本化的假连接器。
//! The session layer depends only on these traits; production uses
//! [`bridge::BridgeConnector`], tests use a scripted fake connector.

pub mod bridge;

pub use bridge::BridgeConnector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cache::StoredMessage;
use crate::domain::{ContactProfile, GroupMetadata, MessageContent, PictureTier};
use crate::store::CredentialRecord;

/// 协议层错误 / Protocol-layer error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("protocol endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("protocol request timed out: {0}")]
    Timeout(String),
    #[error("protocol link closed")]
    Closed,
    #[error("protocol rejected request: {0}")]
    Rejected(String),
    #[error("malformed protocol frame: {0}")]
    Malformed(String),
}

/// 消息键 / Message key
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageKey {
    pub id: String,
    pub remote_jid: String,
    /// 另一种寻址方式下的同一对端 / Same party under the other addressing mode
    #[serde(default)]
    pub remote_jid_alt: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub participant: Option<String>,
}

/// 协议层原始消息 / Raw message from the protocol layer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub key: MessageKey,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
    /// 无内容（如协议控制消息）时为 None / None for content-less protocol messages
    #[serde(default)]
    pub content: Option<MessageContent>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    Live,
    History,
}

/// 本账号标识 / Own account identity
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct OwnIdentity {
    pub jid: String,
    #[serde(default)]
    pub lid: Option<String>,
    #[serde(default)]
    pub push_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContactRecord {
    pub id: String,
    #[serde(default)]
    pub lid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// 连接关闭原因 / Connection close cause
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "cause", content = "reason", rename_all = "snake_case")]
pub enum CloseCause {
    LoggedOut,
    RestartRequired,
    ConnectionLost(String),
    Other(String),
}

impl CloseCause {
    pub fn describe(&self) -> String {
        match self {
            CloseCause::LoggedOut => "logged_out".to_string(),
            CloseCause::RestartRequired => "restart_required".to_string(),
            CloseCause::ConnectionLost(r) => format!("connection_lost: {}", r),
            CloseCause::Other(r) => r.clone(),
        }
    }
}

/// 协议层推送的事件 / Events pushed by the protocol layer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProtocolEvent {
    Qr {
        payload: String,
    },
    Open {
        #[serde(default)]
        me: Option<OwnIdentity>,
    },
    Closed {
        cause: CloseCause,
    },
    Messages {
        messages: Vec<RawMessage>,
        origin: MessageOrigin,
    },
    CredentialsUpdated {
        credentials: CredentialRecord,
    },
    Contacts {
        contacts: Vec<ContactRecord>,
    },
    AliasMapping {
        lid: String,
        pn: String,
    },
    ParticipantsChanged {
        group_jid: String,
        #[serde(default)]
        participants: Vec<String>,
    },
    GroupUpdated {
        group_jid: String,
    },
}

/// 协议层回查已发送/已接收消息 / Lets the protocol layer look up stored messages
pub trait MessageLookup: Send + Sync {
    fn lookup(&self, id: &str, remote_jid: &str) -> Option<StoredMessage>;
}

/// 打开连接的参数 / Arguments for opening a link
#[derive(Clone)]
pub struct OpenRequest {
    pub instance_id: String,
    /// None 表示全新配对 / None means a fresh pairing
    pub credentials: Option<CredentialRecord>,
    pub message_lookup: Arc<dyn MessageLookup>,
}

/// 已打开的协议连接 / An opened protocol link
pub struct ProtocolLink {
    pub session: Arc<dyn ProtocolSession>,
    pub events: mpsc::UnboundedReceiver<ProtocolEvent>,
}

#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// 发送文本，返回消息ID / Send text, returns the message id
    async fn send_text(&self, to: &str, text: &str) -> Result<String, ProtocolError>;
    async fn group_metadata(&self, group_jid: &str) -> Result<GroupMetadata, ProtocolError>;
    async fn profile_picture_url(
        &self,
        jid: &str,
        tier: PictureTier,
    ) -> Result<Option<String>, ProtocolError>;
    /// 对端不存在时返回 None / None when the party is unknown to the network
    async fn contact_profile(&self, jid: &str) -> Result<Option<ContactProfile>, ProtocolError>;
    /// 注销设备（终止性）/ Log the device out (terminal)
    async fn logout(&self) -> Result<(), ProtocolError>;
    /// 关闭传输，不注销 / Close the transport without logging out
    async fn close(&self);
}

#[async_trait]
pub trait ProtocolConnector: Send + Sync {
    async fn open(&self, req: OpenRequest) -> Result<ProtocolLink, ProtocolError>;
}
