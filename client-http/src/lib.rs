pub mod catalog;
pub mod sse;

pub use catalog::HttpCatalog;
pub use sse::SseStockFeed;

use reqwest::StatusCode;
use shared::Error;

/// Map a reqwest failure onto the shared taxonomy: timeouts stay timeouts
/// so the retry policy can tell them apart from hard transport failures.
pub(crate) fn map_reqwest_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Transport(e.to_string())
    }
}

/// 4xx means we sent something the backend refuses and a retry cannot fix;
/// everything else non-success is the backend's problem and transient.
pub(crate) fn map_status(status: StatusCode) -> Error {
    if status.is_client_error() {
        Error::BadRequest(format!("backend rejected request: {status}"))
    } else {
        Error::Status(status.as_u16())
    }
}
