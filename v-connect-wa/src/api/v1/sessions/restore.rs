use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::http::HttpError;
use v::response::respond_any;

use crate::server::VConnectWaServer;

// 路由注册入口（POST）/ Route registration entry (POST)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(restore_session_handle)));
}

pub async fn restore_session_handle(
    server: web::Data<VConnectWaServer>,
    path: web::Path<String>,
) -> Result<impl Responder, HttpError> {
    let instance = server.manager.restore(&path.into_inner()).await?;
    Ok(respond_any(StatusCode::OK, instance))
}
