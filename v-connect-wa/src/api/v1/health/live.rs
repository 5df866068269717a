use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::response::respond_any;

// 路由注册入口（GET）/ Route registration entry (GET)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(health_live_handle)));
}

// 存活检查 / Liveness check
pub async fn health_live_handle() -> impl Responder {
    let payload = serde_json::json!({
        "status": "alive",
        "service": "v-connect-wa",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    });
    respond_any(StatusCode::OK, payload)
}
