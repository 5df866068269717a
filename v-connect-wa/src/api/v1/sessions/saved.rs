use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::http::HttpError;
use v::response::respond_any;

use crate::domain::api::SavedSessionsResponse;
use crate::server::VConnectWaServer;

// 路由注册入口（GET）/ Route registration entry (GET)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(saved_sessions_handle)));
}

// 可恢复的凭据ID / Restorable credential ids
pub async fn saved_sessions_handle(
    server: web::Data<VConnectWaServer>,
) -> Result<impl Responder, HttpError> {
    let sessions = server.manager.saved_sessions().await?;
    Ok(respond_any(StatusCode::OK, SavedSessionsResponse { sessions }))
}
