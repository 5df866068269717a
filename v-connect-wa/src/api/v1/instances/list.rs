use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::response::respond_any;

use crate::server::VConnectWaServer;

// 列出全部实例 / List every instance
pub async fn list_instances_handle(server: web::Data<VConnectWaServer>) -> impl Responder {
    respond_any(StatusCode::OK, server.manager.list_all())
}
