use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },
    #[error("unexpected backend payload: {0}")]
    Decode(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            BackendError::RequestFailed {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            BackendError::Unavailable(e.to_string())
        }
    }
}
