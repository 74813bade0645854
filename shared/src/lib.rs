// shared/src/lib.rs

/// Error conditions raised at the boundary with external collaborators.
///
/// Cache lookups never produce one of these: absence and staleness are
/// returned as values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("another update for user '{user_id}' is already in flight")]
    ConcurrentUpdate { user_id: String },
    #[error("upstream write failed: {0}")]
    UpstreamWriteFailed(String),
    #[error("upstream read failed: {0}")]
    UpstreamReadFailed(String),
    #[error("validation rejected: {0}")]
    ValidationRejected(String),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code, used on the wire and in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound => "NOT_FOUND",
            Error::ConcurrentUpdate { .. } => "CONCURRENT_UPDATE",
            Error::UpstreamWriteFailed(_) => "UPSTREAM_WRITE_FAILED",
            Error::UpstreamReadFailed(_) => "UPSTREAM_READ_FAILED",
            Error::ValidationRejected(_) => "VALIDATION_REJECTED",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the caller may retry the same action later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConcurrentUpdate { .. }
                | Error::UpstreamWriteFailed(_)
                | Error::UpstreamReadFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlMs(pub u64);

impl From<TtlMs> for std::time::Duration {
    fn from(ttl: TtlMs) -> Self {
        std::time::Duration::from_millis(ttl.0)
    }
}

pub mod config;
