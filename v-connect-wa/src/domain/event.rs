use serde::{Deserialize, Serialize};

use super::instance::Instance;
use super::message::MessageEnvelope;

/// 单个实例发出的领域事件 / Domain event emitted by one instance
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstanceEvent {
    Qr {
        qr_code: String,
    },
    Connected {
        phone_number: Option<String>,
    },
    Disconnected {
        reason: String,
        /// 终止性登出，实例已移除 / Terminal logout, instance already removed
        logged_out: bool,
    },
    Message {
        message: MessageEnvelope,
    },
    HistorySync {
        messages: Vec<MessageEnvelope>,
    },
    Error {
        error: String,
    },
}

impl InstanceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InstanceEvent::Qr { .. } => "qr",
            InstanceEvent::Connected { .. } => "connected",
            InstanceEvent::Disconnected { .. } => "disconnected",
            InstanceEvent::Message { .. } => "message",
            InstanceEvent::HistorySync { .. } => "history_sync",
            InstanceEvent::Error { .. } => "error",
        }
    }
}

/// 管理器合并后的事件，带实例ID / Manager-merged event tagged with its instance id
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ManagerEvent {
    pub instance_id: String,
    pub event: InstanceEvent,
}

impl ManagerEvent {
    pub fn new(instance_id: impl Into<String>, event: InstanceEvent) -> Self {
        Self {
            instance_id: instance_id.into(),
            event,
        }
    }

    /// 转换为实时通道帧；历史同步拆分为逐条 message 帧
    /// Convert into realtime frames; history batches become one message frame each
    pub fn to_frames(&self) -> Vec<RealtimeFrame> {
        let id = &self.instance_id;
        match &self.event {
            InstanceEvent::Qr { qr_code } => vec![RealtimeFrame::new(
                "qr",
                serde_json::json!({ "instanceId": id, "qrCode": qr_code }),
            )],
            InstanceEvent::Connected { phone_number } => vec![RealtimeFrame::new(
                "connected",
                serde_json::json!({ "instanceId": id, "phoneNumber": phone_number }),
            )],
            InstanceEvent::Disconnected { .. } => vec![RealtimeFrame::new(
                "disconnected",
                serde_json::json!({ "instanceId": id }),
            )],
            InstanceEvent::Message { message } => vec![RealtimeFrame::new(
                "message",
                serde_json::json!({ "instanceId": id, "message": message }),
            )],
            InstanceEvent::HistorySync { messages } => messages
                .iter()
                .map(|m| {
                    RealtimeFrame::new(
                        "message",
                        serde_json::json!({ "instanceId": id, "message": m }),
                    )
                })
                .collect(),
            InstanceEvent::Error { error } => vec![RealtimeFrame::new(
                "error",
                serde_json::json!({ "instanceId": id, "error": error }),
            )],
        }
    }
}

/// 实时通道消息结构 / Realtime channel frame
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RealtimeFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RealtimeFrame {
    pub fn new(frame_type: &str, data: serde_json::Value) -> Self {
        Self {
            frame_type: frame_type.to_string(),
            data,
        }
    }

    pub fn snapshot(instances: &[Instance]) -> Self {
        Self::new("snapshot", serde_json::json!({ "instances": instances }))
    }
}
