use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::http::HttpError;
use v::response::respond_any;

use crate::server::VConnectWaServer;

pub async fn get_instance_handle(
    server: web::Data<VConnectWaServer>,
    path: web::Path<String>,
) -> Result<impl Responder, HttpError> {
    let id = path.into_inner();
    let instance = server
        .manager
        .get(&id)
        .ok_or_else(|| HttpError::NotFound(format!("instance {} not found", id)))?;
    Ok(respond_any(StatusCode::OK, instance))
}
