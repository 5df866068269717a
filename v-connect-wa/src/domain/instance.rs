use serde::{Deserialize, Serialize};

/// 实例连接状态 / Instance connection status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Disconnected,
    Connecting,
    Connected,
    QrReady,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Disconnected => "disconnected",
            InstanceStatus::Connecting => "connecting",
            InstanceStatus::Connected => "connected",
            InstanceStatus::QrReady => "qr_ready",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 受管实例快照 / Managed instance snapshot
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub status: InstanceStatus,
    /// 仅在 qr_ready 时有意义 / Only meaningful while qr_ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    /// 连接建立时间（毫秒）/ Connected-at (epoch millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl Instance {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: InstanceStatus::Disconnected,
            qr_code: None,
            connected_at: None,
            phone_number: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == InstanceStatus::Connected
    }
}
