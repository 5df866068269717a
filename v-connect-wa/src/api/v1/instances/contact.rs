use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::http::HttpError;
use v::response::respond_any;

use crate::server::VConnectWaServer;

// 路由注册入口（GET）/ Route registration entry (GET)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(contact_info_handle)));
}

pub async fn contact_info_handle(
    server: web::Data<VConnectWaServer>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, HttpError> {
    let (id, jid) = path.into_inner();
    let info = server
        .manager
        .contact_info(&id, &jid)
        .await?
        .ok_or_else(|| HttpError::NotFound(format!("contact {} not found", jid)))?;
    Ok(respond_any(StatusCode::OK, info))
}
