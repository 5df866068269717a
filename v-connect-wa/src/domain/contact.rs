use serde::{Deserialize, Serialize};

/// 头像分辨率档位 / Profile picture resolution tier
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PictureTier {
    #[default]
    Preview,
    Image,
}

/// 协议层返回的联系人资料 / Contact profile as returned by the protocol layer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContactProfile {
    pub jid: String,
    /// 对方是否存在于网络 / Whether the party exists on the network
    pub exists: bool,
    #[serde(default)]
    pub lid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
}

/// 群组元数据（仅用于协议回调与诊断）/ Group metadata (protocol callbacks and diagnostics only)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GroupMetadata {
    pub jid: String,
    pub subject: String,
    #[serde(default)]
    pub participants: Vec<String>,
}

/// 控制接口返回的联系人信息 / Contact info returned by the control API
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub jid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    pub profile_picture_url: Option<String>,
}
