//! Scripted in-process posts service for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::error::RemoteError;

use super::PostsApi;
use super::{ApiResponse, Post};

type Reply<T> = Result<ApiResponse<T>, RemoteError>;

pub fn ok<T>(body: T) -> ApiResponse<T> {
  ApiResponse::new(200, "OK", Some(body))
}

pub fn rejected<T>(code: u16, message: &str) -> ApiResponse<T> {
  ApiResponse::new(code, message, None)
}

pub fn post(id: i64) -> Post {
  Post {
    id,
    author: format!("author {}", id),
    author_avatar: String::new(),
    content: format!("post {}", id),
    published: 1_700_000_000 + id,
    liked_by_me: false,
    likes: 0,
  }
}

/// Replies are consumed in the order they were pushed. A call with nothing
/// scripted fails with [`RemoteError::Other`].
#[derive(Default)]
pub struct FakePostsApi {
  all: Mutex<VecDeque<Reply<Vec<Post>>>>,
  newer: Mutex<VecDeque<Reply<Vec<Post>>>>,
  saved: Mutex<VecDeque<Reply<Post>>>,
  removed: Mutex<VecDeque<Reply<()>>>,
  liked: Mutex<VecDeque<Reply<Post>>>,
  newer_requests: Mutex<Vec<i64>>,
  like_gate: Option<Arc<Notify>>,
  hang_newer: bool,
}

impl FakePostsApi {
  /// Hold every like request until the gate is notified.
  pub fn with_like_gate(mut self, gate: Arc<Notify>) -> Self {
    self.like_gate = Some(gate);
    self
  }

  /// Never answer `get_newer`.
  pub fn hanging_newer(mut self) -> Self {
    self.hang_newer = true;
    self
  }

  pub fn push_all(&self, reply: Reply<Vec<Post>>) {
    self.all.lock().unwrap().push_back(reply);
  }

  pub fn push_newer(&self, reply: Reply<Vec<Post>>) {
    self.newer.lock().unwrap().push_back(reply);
  }

  pub fn push_save(&self, reply: Reply<Post>) {
    self.saved.lock().unwrap().push_back(reply);
  }

  pub fn push_remove(&self, reply: Reply<()>) {
    self.removed.lock().unwrap().push_back(reply);
  }

  pub fn push_like(&self, reply: Reply<Post>) {
    self.liked.lock().unwrap().push_back(reply);
  }

  /// The `since_id` of every `get_newer` call so far.
  pub fn newer_requests(&self) -> Vec<i64> {
    self.newer_requests.lock().unwrap().clone()
  }
}

fn next<T>(queue: &Mutex<VecDeque<Reply<T>>>) -> Reply<T> {
  queue
    .lock()
    .unwrap()
    .pop_front()
    .unwrap_or_else(|| Err(RemoteError::Other("no scripted reply".to_string())))
}

#[async_trait]
impl PostsApi for FakePostsApi {
  async fn get_all(&self) -> Reply<Vec<Post>> {
    next(&self.all)
  }

  async fn get_newer(&self, since_id: i64) -> Reply<Vec<Post>> {
    self.newer_requests.lock().unwrap().push(since_id);
    if self.hang_newer {
      std::future::pending::<()>().await;
    }
    next(&self.newer)
  }

  async fn save(&self, _post: &Post) -> Reply<Post> {
    next(&self.saved)
  }

  async fn remove_by_id(&self, _id: i64) -> Reply<()> {
    next(&self.removed)
  }

  async fn like_by_id(&self, _id: i64) -> Reply<Post> {
    if let Some(gate) = &self.like_gate {
      gate.notified().await;
    }
    next(&self.liked)
  }
}
