use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::contact::PictureTier;
use super::instance::InstanceStatus;

#[derive(Deserialize, Debug, Default)]
pub struct CreateInstanceRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    pub qr_code: Option<String>,
    pub status: InstanceStatus,
    #[serde(rename = "hasQR")]
    pub has_qr: bool,
}

/// 字段均可缺省，缺失时返回 400 / Fields are optional so that missing ones map to 400
#[derive(Deserialize, Debug, Default)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Deserialize, Debug)]
pub struct ProfilePictureQuery {
    pub jid: String,
    #[serde(default)]
    pub tier: PictureTier,
}

#[derive(Serialize, Debug)]
pub struct ProfilePictureResponse {
    pub jid: String,
    pub url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ProfilePicturesRequest {
    pub jids: Vec<String>,
    #[serde(default)]
    pub tier: PictureTier,
}

#[derive(Serialize, Debug)]
pub struct ProfilePicturesResponse {
    pub pictures: BTreeMap<String, Option<String>>,
}

#[derive(Serialize, Debug)]
pub struct SavedSessionsResponse {
    pub sessions: Vec<String>,
}
