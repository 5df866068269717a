use actix_web::{http::StatusCode, HttpResponse};

// 通用 HTTP 响应封装
// Generic HTTP response helpers

// 结构体自动转 JSON，失败则原样文本
// Auto JSON from struct, fallback to debug text
pub fn respond_any<T: serde::Serialize + std::fmt::Debug>(
    code: StatusCode,
    data: T,
) -> HttpResponse {
    match serde_json::to_value(&data) {
        Ok(v) => HttpResponse::build(code).json(v),
        Err(_) => HttpResponse::build(code)
            .content_type("text/plain; charset=utf-8")
            .body(format!("{:?}", data)),
    }
}

// 错误响应（状态码与错误体来自 HttpError）
// Error response (status and body from HttpError)
pub fn respond_error(err: &crate::http::HttpError) -> HttpResponse {
    let code = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(code).json(err.to_body())
}
