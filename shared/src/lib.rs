// shared/src/lib.rs

/// Error taxonomy shared by every crate in the workspace.
///
/// The enum is `Clone` so a single failed fetch can be handed to every
/// caller waiting on the same coalesced in-flight request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("request timed out")]
    Timeout,
    #[error("transport: {0}")]
    Transport(String),
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("stream closed")]
    Closed,
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a failure is worth another attempt under the bounded retry
    /// policy. Client-input failures are final.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout | Error::Transport(_) | Error::Decode(_) | Error::Closed => true,
            Error::Status(code) => *code >= 500,
            Error::BadRequest(_) | Error::Internal(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Time-to-live in milliseconds for a single cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlMs(pub u64);

impl TtlMs {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0)
    }
}

pub mod config;
