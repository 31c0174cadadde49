//! Post repository: reconciles the remote posts service with the local cache.

use futures::{future, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{Post, PostsApi};
use crate::cache::{PostRecord, PostStore};
use crate::error::SyncError;
use crate::event::SyncEvent;
use crate::poller::NewerPostsPoller;

/// Entry point for everything the feed does with posts.
///
/// Reads come from the cache only. Writes go to the posts service and are
/// merged into the cache; `like` is applied locally first, `remove` only
/// after the server confirms.
#[derive(Clone)]
pub struct PostRepository {
  api: Arc<dyn PostsApi>,
  store: Arc<dyn PostStore>,
}

impl PostRepository {
  pub fn new(api: Arc<dyn PostsApi>, store: Arc<dyn PostStore>) -> Self {
    Self { api, store }
  }

  /// Live feed of visible posts, newest first.
  ///
  /// Each call starts a fresh subscription that yields the current feed and
  /// then every later change. It never touches the network.
  pub fn posts(&self) -> impl Stream<Item = Vec<Post>> + Send + 'static {
    self.store.observe_all().map(|records| {
      records
        .into_iter()
        .filter(|record| record.visible)
        .map(|record| record.post)
        .collect()
    })
  }

  /// Live count of posts waiting to be revealed.
  ///
  /// Yields the current count, then only when it differs from the last one.
  pub fn hidden_count(&self) -> impl Stream<Item = usize> + Send + 'static {
    let mut last = None;
    self
      .store
      .observe_all()
      .map(|records| records.iter().filter(|record| !record.visible).count())
      .filter_map(move |count| {
        let changed = last.replace(count) != Some(count);
        future::ready(changed.then_some(count))
      })
  }

  /// Fetch every post and merge it into the cache.
  ///
  /// Nothing is written unless the whole response is usable.
  pub async fn refresh(&self) -> Result<(), SyncError> {
    let posts = self.api.get_all().await?.into_body()?;
    debug!(count = posts.len(), "refreshed posts");

    self.store.upsert_many(&PostRecord::from_posts(posts, true))?;
    Ok(())
  }

  /// Save a post on the server and cache the version it returns.
  pub async fn save(&self, post: &Post) -> Result<Post, SyncError> {
    let saved = self.api.save(post).await?.into_body()?;
    debug!(id = saved.id, "saved post");

    self.store.upsert_many(&[PostRecord::new(saved.clone(), true)])?;
    Ok(saved)
  }

  /// Like a post.
  ///
  /// The cache is updated before the request is sent. A failure is returned
  /// as-is and the local like stays in place; the next refresh or poll
  /// brings the cache back in line with the server.
  pub async fn like(&self, id: i64) -> Result<(), SyncError> {
    self.store.like_by_id(id)?;

    let confirmed = self.api.like_by_id(id).await?.into_body()?;
    self.store.update_post(&confirmed)?;
    Ok(())
  }

  /// Delete a post on the server, then drop it from the cache.
  ///
  /// The cached post is left untouched if the server does not confirm.
  pub async fn remove(&self, id: i64) -> Result<(), SyncError> {
    self.api.remove_by_id(id).await?.ensure_success()?;
    debug!(id, "removed post");

    self.store.remove_by_id(id)?;
    Ok(())
  }

  /// Show every post that arrived hidden.
  pub fn reveal_hidden(&self) {
    if let Err(e) = self.store.set_all_visible() {
      warn!(error = %e, "failed to reveal hidden posts");
    }
  }

  /// A poller sharing this repository's service and cache.
  pub fn poller(&self, events: mpsc::UnboundedSender<SyncEvent>) -> NewerPostsPoller {
    NewerPostsPoller::new(Arc::clone(&self.api), Arc::clone(&self.store), events)
  }
}
