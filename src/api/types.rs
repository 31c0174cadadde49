use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// A single feed post, as exchanged with the posts service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
  /// Server-assigned identifier; 0 for a post that has not been saved yet
  pub id: i64,
  pub author: String,
  #[serde(default)]
  pub author_avatar: String,
  pub content: String,
  /// Unix timestamp in seconds
  #[serde(default)]
  pub published: i64,
  #[serde(default)]
  pub liked_by_me: bool,
  #[serde(default)]
  pub likes: u32,
}

impl Post {
  /// A new post that the server has not assigned an id to yet.
  pub fn draft(author: &str, content: &str) -> Self {
    Self {
      id: 0,
      author: author.to_string(),
      author_avatar: String::new(),
      content: content.to_string(),
      published: Utc::now().timestamp(),
      liked_by_me: false,
      likes: 0,
    }
  }

  pub fn published_at(&self) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(self.published, 0)
  }
}

/// Response from the posts service: status line plus an optional body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
  pub code: u16,
  pub message: String,
  pub body: Option<T>,
}

impl<T> ApiResponse<T> {
  pub fn new(code: u16, message: impl Into<String>, body: Option<T>) -> Self {
    Self {
      code,
      message: message.into(),
      body,
    }
  }

  pub fn is_successful(&self) -> bool {
    (200..300).contains(&self.code)
  }

  /// The error a caller reports when this response cannot be used.
  pub fn rejection(&self) -> SyncError {
    SyncError::Api {
      code: self.code,
      message: self.message.clone(),
    }
  }

  /// Fail unless the status is successful. The body is not inspected.
  pub fn ensure_success(&self) -> Result<(), SyncError> {
    if self.is_successful() {
      Ok(())
    } else {
      Err(self.rejection())
    }
  }

  /// Take the body of a successful response.
  ///
  /// A failing status and a successful status without a body are both
  /// reported as [`SyncError::Api`] carrying this response's status line.
  pub fn into_body(self) -> Result<T, SyncError> {
    self.ensure_success()?;
    let rejection = self.rejection();
    self.body.ok_or(rejection)
  }
}
