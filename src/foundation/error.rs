/// Convenience result type used across odsynth.
pub type OdsResult<T> = Result<T, OdsError>;

/// Top-level error taxonomy used by synthesis APIs.
#[derive(thiserror::Error, Debug)]
pub enum OdsError {
    /// Malformed depth stream: bad magic, bad header, or an undecodable payload.
    #[error("format error: {0}")]
    Format(String),

    /// Depth payload ended before every declared sample was produced.
    #[error("truncated data: {0}")]
    TruncatedData(String),

    /// Caller-supplied parameter out of range. Rejected before any work begins.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid rig or manifest data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OdsError {
    /// Build an [`OdsError::Format`] value.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Build an [`OdsError::TruncatedData`] value.
    pub fn truncated(msg: impl Into<String>) -> Self {
        Self::TruncatedData(msg.into())
    }

    /// Build an [`OdsError::InvalidArgument`] value.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Build an [`OdsError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
