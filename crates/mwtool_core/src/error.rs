//! Error taxonomy shared by every layer of the client.

use serde_json::Value;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Status code is {0}")]
    StatusCode(u16),

    /// `cantdelete`: the page could not be deleted (usually it does not exist).
    #[error("cannot delete page: {0}")]
    CannotDelete(String),

    #[error("page is protected: {0}")]
    PageProtected(Value),

    /// `badtoken`: the attached token is stale. Recovered internally by one retry.
    #[error("token was rejected by the server")]
    BadToken,

    /// Any other server-reported error or warning, with the raw payload.
    #[error("MediaWiki API error: {0}")]
    Misc(Value),

    #[error("{0} is not supported by this protocol version")]
    Unsupported(&'static str),

    #[error("failed to call MediaWiki API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("invalid page filter expression: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("failed to read upload source: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn misc(detail: impl Into<String>) -> Self {
        Self::Misc(Value::String(detail.into()))
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::Decode(detail.into())
    }

    pub fn is_cannot_delete(&self) -> bool {
        matches!(self, Self::CannotDelete(_))
    }

    pub fn is_page_protected(&self) -> bool {
        matches!(self, Self::PageProtected(_))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}
