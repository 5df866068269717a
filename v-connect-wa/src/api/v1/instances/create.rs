use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use tracing::info;
use v::http::HttpError;
use v::response::respond_any;

use crate::domain::api::CreateInstanceRequest;
use crate::server::VConnectWaServer;

// 创建实例；请求体可省略 / Create an instance; the body is optional
pub async fn create_instance_handle(
    server: web::Data<VConnectWaServer>,
    body: Option<web::Json<CreateInstanceRequest>>,
) -> Result<impl Responder, HttpError> {
    let name = body.and_then(|b| b.into_inner().name);
    let instance = server.manager.create(name).await?;
    info!(instance_id = %instance.id, "instance created via control API");
    Ok(respond_any(StatusCode::OK, instance))
}
