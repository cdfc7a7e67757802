use thiserror::Error;

/// Errors arising from the lewei_cam wire protocol, stream engine, and
/// high-level camera API.
#[derive(Debug, Error)]
pub enum CamError {
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Framing(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("unsupported value {value} for {what}")]
    Unsupported { what: &'static str, value: u32 },

    #[error("cancelled")]
    Cancelled,
}

impl CamError {
    pub(crate) fn framing(msg: impl Into<String>) -> Self {
        Self::Framing(msg.into())
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub(crate) fn invalid_argument(what: &'static str) -> Self {
        Self::InvalidArgument(what)
    }

    pub(crate) fn unsupported(what: &'static str, value: u32) -> Self {
        Self::Unsupported { what, value }
    }
}

pub type Result<T> = std::result::Result<T, CamError>;
