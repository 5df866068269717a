use actix_web::web;

pub mod contact;
pub mod create;
pub mod delete;
pub mod get;
pub mod group;
pub mod list;
pub mod profile_picture;
pub mod qr;
pub mod send;

// 同一路径上的多种方法合并为一个资源 / Methods sharing a path share one resource
pub fn register(cfg: &mut web::ServiceConfig, base: &str) {
    cfg.service(
        web::resource(base)
            .route(web::get().to(list::list_instances_handle))
            .route(web::post().to(create::create_instance_handle)),
    );
    cfg.service(
        web::resource(format!("{}/{{id}}", base))
            .route(web::get().to(get::get_instance_handle))
            .route(web::delete().to(delete::delete_instance_handle)),
    );
    qr::register(cfg, &format!("{}/{{id}}/qr", base));
    send::register(cfg, &format!("{}/{{id}}/send", base));
    profile_picture::register(cfg, &format!("{}/{{id}}", base));
    contact::register(cfg, &format!("{}/{{id}}/contacts/{{jid}}", base));
    group::register(cfg, &format!("{}/{{id}}/groups/{{jid}}", base));
}
