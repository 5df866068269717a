use serde::{Deserialize, Serialize};

/// 字段级校验错误 / Field-level validation error
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldError {
    /// 必填字段缺失 / Required field missing
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            code: "missing_field".to_string(),
            message: None,
        }
    }
}

/// 统一错误响应体 / Unified error body
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// HTTP 层错误 / HTTP-layer error
#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Validation Failed")]
    Validation(Vec<FieldError>),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Bad Gateway: {0}")]
    BadGateway(String),
    #[error("Internal Error: {0}")]
    Internal(String),
}

impl HttpError {
    pub fn status_code(&self) -> u16 {
        match self {
            HttpError::BadRequest(_) | HttpError::Validation(_) => 400,
            HttpError::NotFound(_) => 404,
            HttpError::Conflict(_) => 409,
            HttpError::BadGateway(_) => 502,
            HttpError::Internal(_) => 500,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        match self {
            HttpError::BadRequest(msg)
            | HttpError::NotFound(msg)
            | HttpError::Conflict(msg)
            | HttpError::BadGateway(msg)
            | HttpError::Internal(msg) => ErrorBody {
                message: msg.clone(),
                errors: None,
            },
            HttpError::Validation(errors) => ErrorBody {
                message: "Validation Failed".to_string(),
                errors: Some(errors.clone()),
            },
        }
    }
}
