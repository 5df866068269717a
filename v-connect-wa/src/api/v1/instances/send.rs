use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use v::http::{FieldError, HttpError};
use v::response::respond_any;

use crate::domain::api::{SendMessageRequest, SuccessResponse};
use crate::server::VConnectWaServer;

// 路由注册入口（POST）/ Route registration entry (POST)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(send_message_handle)));
}

fn required(value: &Option<String>, field: &str) -> Option<FieldError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => None,
        _ => Some(FieldError::missing(field)),
    }
}

// 发送文本消息；字段缺失或发送失败返回 400
// Send a text message; missing fields or a failed send return 400
pub async fn send_message_handle(
    server: web::Data<VConnectWaServer>,
    path: web::Path<String>,
    body: web::Json<SendMessageRequest>,
) -> Result<impl Responder, HttpError> {
    let id = path.into_inner();
    let req = body.into_inner();
    let errors: Vec<FieldError> = [required(&req.to, "to"), required(&req.message, "message")]
        .into_iter()
        .flatten()
        .collect();
    if !errors.is_empty() {
        return Err(HttpError::Validation(errors));
    }
    let to = req.to.unwrap_or_default();
    let message = req.message.unwrap_or_default();
    if !server.manager.send_message(&id, &to, &message).await? {
        return Err(HttpError::BadRequest("failed to send message".to_string()));
    }
    Ok(respond_any(StatusCode::OK, SuccessResponse { success: true }))
}
