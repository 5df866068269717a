use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::http::HttpError;
use v::response::respond_any;

use crate::domain::api::{
    ProfilePictureQuery, ProfilePictureResponse, ProfilePicturesRequest, ProfilePicturesResponse,
};
use crate::server::VConnectWaServer;

// 单个（GET）与批量（POST）头像查询 / Single (GET) and batch (POST) picture lookups
pub fn register(cfg: &mut web::ServiceConfig, instance_path: &str) {
    cfg.service(
        web::resource(format!("{}/profile-picture", instance_path))
            .route(web::get().to(profile_picture_handle)),
    );
    cfg.service(
        web::resource(format!("{}/profile-pictures", instance_path))
            .route(web::post().to(profile_pictures_handle)),
    );
}

pub async fn profile_picture_handle(
    server: web::Data<VConnectWaServer>,
    path: web::Path<String>,
    query: web::Query<ProfilePictureQuery>,
) -> Result<impl Responder, HttpError> {
    let id = path.into_inner();
    let query = query.into_inner();
    let url = server
        .manager
        .profile_picture(&id, &query.jid, query.tier)
        .await?;
    Ok(respond_any(
        StatusCode::OK,
        ProfilePictureResponse {
            jid: query.jid,
            url,
        },
    ))
}

pub async fn profile_pictures_handle(
    server: web::Data<VConnectWaServer>,
    path: web::Path<String>,
    body: web::Json<ProfilePicturesRequest>,
) -> Result<impl Responder, HttpError> {
    let id = path.into_inner();
    let req = body.into_inner();
    let pictures = server
        .manager
        .profile_pictures(&id, &req.jids, req.tier)
        .await?;
    Ok(respond_any(StatusCode::OK, ProfilePicturesResponse { pictures }))
}
