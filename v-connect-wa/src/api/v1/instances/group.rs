use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::http::HttpError;
use v::response::respond_any;

use crate::server::VConnectWaServer;

// 群组元数据诊断（GET）/ Group metadata diagnostics (GET)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(group_metadata_handle)));
}

pub async fn group_metadata_handle(
    server: web::Data<VConnectWaServer>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, HttpError> {
    let (id, group_jid) = path.into_inner();
    let meta = server.manager.group_metadata(&id, &group_jid).await?;
    Ok(respond_any(StatusCode::OK, meta))
}
