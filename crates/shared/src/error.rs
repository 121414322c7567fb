use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Transport,
    HttpStatus,
    Decode,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("transport failure fetching {url}: {message}")]
    Transport { url: String, message: String },
    #[error("HTTP error! Status: {status} ({url})")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RequestError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Status { .. } => ErrorCode::HttpStatus,
            Self::Decode { .. } => ErrorCode::Decode,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. } | Self::Status { url, .. } | Self::Decode { url, .. } => url,
        }
    }
}
