use actix_web::web;

/// 控制面路由 / Control API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    crate::api::v1::health::live::register(cfg, "/v1/health/live");
    crate::api::v1::health::ready::register(cfg, "/v1/health/ready");
    crate::api::v1::instances::register(cfg, "/v1/instances");
    crate::api::v1::sessions::register(cfg, "/v1/sessions");
}
