use thiserror::Error;

use crate::domain::response::HandlerResponse;

/// Failure classes as seen by the platform calling the webhook.
///
/// Lower layers keep their own error enums and map into one of these at the
/// dispatcher boundary; the adapters only ever see the resulting response.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
    #[error("upstream failure: {message}")]
    Upstream { message: String },
}

impl InterfaceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream { message: message.into() }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::Upstream { .. } => 500,
        }
    }

    /// Bad requests echo their message so the platform's delivery log shows why;
    /// everything else answers with an empty body.
    pub fn to_response(&self) -> HandlerResponse {
        match self {
            Self::BadRequest { message } => HandlerResponse::bad_request(message.as_bytes()),
            Self::Unauthorized { .. } | Self::Upstream { .. } => {
                HandlerResponse::empty(self.status_code())
            }
        }
    }
}
