use v::http::{FieldError, HttpError};

use crate::protocol::ProtocolError;

/// 会话管理错误 / Session manager error
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("instance {0} not found")]
    NotFound(String),
    #[error("instance {0} already exists")]
    AlreadyExists(String),
    /// 首次协议握手失败，实例未注册 / First protocol handshake failed, nothing registered
    #[error("handshake failed for {instance_id}: {source}")]
    Handshake {
        instance_id: String,
        #[source]
        source: ProtocolError,
    },
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("credential storage: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type ManagerResult<T> = std::result::Result<T, ManagerError>;

impl From<ManagerError> for HttpError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::NotFound(_) => HttpError::NotFound(e.to_string()),
            ManagerError::AlreadyExists(_) => HttpError::Conflict(e.to_string()),
            ManagerError::MissingField(field) => HttpError::Validation(vec![FieldError::missing(field)]),
            ManagerError::InvalidRequest(_) => HttpError::BadRequest(e.to_string()),
            ManagerError::Handshake { .. } | ManagerError::Protocol(_) => {
                HttpError::BadGateway(e.to_string())
            }
            ManagerError::Storage(_) => HttpError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_mapping() {
        assert_eq!(HttpError::from(ManagerError::NotFound("inst_x".into())).status_code(), 404);
        assert_eq!(HttpError::from(ManagerError::MissingField("to")).status_code(), 400);
        let handshake = ManagerError::Handshake {
            instance_id: "inst_x".into(),
            source: ProtocolError::Unavailable("refused".into()),
        };
        assert_eq!(HttpError::from(handshake).status_code(), 502);
        assert_eq!(
            HttpError::from(ManagerError::Storage(anyhow::anyhow!("disk full"))).status_code(),
            500
        );
    }
}
