use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::http::HttpError;
use v::response::respond_any;

use crate::domain::api::SuccessResponse;
use crate::server::VConnectWaServer;

// 注销并删除实例 / Log out and delete an instance
pub async fn delete_instance_handle(
    server: web::Data<VConnectWaServer>,
    path: web::Path<String>,
) -> Result<impl Responder, HttpError> {
    let id = path.into_inner();
    if !server.manager.delete(&id).await {
        return Err(HttpError::NotFound(format!("instance {} not found", id)));
    }
    Ok(respond_any(StatusCode::OK, SuccessResponse { success: true }))
}
