use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::response::respond_any;
use v::HealthCheck;

use crate::server::VConnectWaServer;

// 路由注册入口（GET）/ Route registration entry (GET)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(health_ready_handle)));
}

// 就绪检查 / Readiness check
pub async fn health_ready_handle(server: web::Data<VConnectWaServer>) -> impl Responder {
    let status = server.check_health().await;
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    respond_any(code, status)
}
