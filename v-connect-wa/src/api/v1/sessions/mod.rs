use actix_web::web;

pub mod restore;
pub mod saved;

pub fn register(cfg: &mut web::ServiceConfig, base: &str) {
    saved::register(cfg, &format!("{}/saved", base));
    restore::register(cfg, &format!("{}/{{id}}/restore", base));
}
