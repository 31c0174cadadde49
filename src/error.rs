//! Error taxonomy for the sync engine.
//!
//! Remote collaborators report raw [`RemoteError`]s. Every foreground
//! operation turns those (and store failures) into exactly one [`SyncError`]
//! before handing them to the caller.

use thiserror::Error;

/// Domain error surfaced by refresh, save, like and remove.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
  /// No response was obtained (refused, timed out, DNS, interrupted I/O)
  #[error("network error: {0}")]
  Network(String),
  /// The server answered but rejected the request or omitted the body
  #[error("api error {code}: {message}")]
  Api { code: u16, message: String },
  /// Anything not covered above
  #[error("unknown error: {0}")]
  Unknown(String),
}

/// Raw failure reported by a [`crate::api::PostsApi`] implementation.
#[derive(Debug, Error)]
pub enum RemoteError {
  /// The request never produced a response
  #[error("transport failure: {0}")]
  Transport(String),
  /// A response arrived with a failing status
  #[error("http {code}: {message}")]
  Status { code: u16, message: String },
  /// A response arrived but its body could not be decoded
  #[error("failed to decode response: {0}")]
  Decode(String),
  #[error("{0}")]
  Other(String),
}

/// Returned by the poller once its cancellation token fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sync task cancelled")]
pub struct Cancelled;

/// Map a raw remote failure onto the domain taxonomy.
pub fn classify(err: RemoteError) -> SyncError {
  match err {
    RemoteError::Transport(reason) => SyncError::Network(reason),
    RemoteError::Status { code, message } => SyncError::Api { code, message },
    RemoteError::Decode(reason) | RemoteError::Other(reason) => SyncError::Unknown(reason),
  }
}

impl From<RemoteError> for SyncError {
  fn from(err: RemoteError) -> Self {
    classify(err)
  }
}

/// Store failures are never transport or protocol problems.
impl From<color_eyre::Report> for SyncError {
  fn from(err: color_eyre::Report) -> Self {
    SyncError::Unknown(err.to_string())
  }
}

impl From<reqwest::Error> for RemoteError {
  fn from(err: reqwest::Error) -> Self {
    if let Some(status) = err.status() {
      return RemoteError::Status {
        code: status.as_u16(),
        message: status.canonical_reason().unwrap_or_default().to_string(),
      };
    }

    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
      RemoteError::Transport(err.to_string())
    } else if err.is_decode() {
      RemoteError::Decode(err.to_string())
    } else {
      RemoteError::Other(err.to_string())
    }
  }
}

impl From<std::io::Error> for RemoteError {
  fn from(err: std::io::Error) -> Self {
    RemoteError::Transport(err.to_string())
  }
}
