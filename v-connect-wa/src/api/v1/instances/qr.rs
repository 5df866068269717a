use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::http::HttpError;
use v::response::respond_any;

use crate::domain::api::QrResponse;
use crate::domain::InstanceStatus;
use crate::server::VConnectWaServer;

// 路由注册入口（GET）/ Route registration entry (GET)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(instance_qr_handle)));
}

// 二维码轮询视图，只读，不会触发新二维码
// QR polling view; read-only, never triggers a new QR
pub async fn instance_qr_handle(
    server: web::Data<VConnectWaServer>,
    path: web::Path<String>,
) -> Result<impl Responder, HttpError> {
    let id = path.into_inner();
    let instance = server
        .manager
        .get(&id)
        .ok_or_else(|| HttpError::NotFound(format!("instance {} not found", id)))?;
    let qr_code = match instance.status {
        InstanceStatus::QrReady => instance.qr_code,
        _ => None,
    };
    Ok(respond_any(
        StatusCode::OK,
        QrResponse {
            has_qr: qr_code.is_some(),
            qr_code,
            status: instance.status,
        },
    ))
}
