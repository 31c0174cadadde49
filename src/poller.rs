//! Background poller that pulls posts newer than the cache's high-water mark.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::PostsApi;
use crate::cache::{PostRecord, PostStore};
use crate::error::{Cancelled, SyncError};
use crate::event::SyncEvent;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Polls the posts service for anything newer than the newest cached post.
///
/// A failed cycle is logged and published as [`SyncEvent::PollFailed`], then
/// the next cycle runs as usual. Only cancellation ends the loop.
pub struct NewerPostsPoller {
  api: Arc<dyn PostsApi>,
  store: Arc<dyn PostStore>,
  interval: Duration,
  hide_new_posts: bool,
  events: mpsc::UnboundedSender<SyncEvent>,
}

impl NewerPostsPoller {
  pub fn new(
    api: Arc<dyn PostsApi>,
    store: Arc<dyn PostStore>,
    events: mpsc::UnboundedSender<SyncEvent>,
  ) -> Self {
    Self {
      api,
      store,
      interval: DEFAULT_POLL_INTERVAL,
      hide_new_posts: false,
      events,
    }
  }

  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  /// Store polled posts hidden until [`crate::repository::PostRepository::reveal_hidden`].
  pub fn with_hidden_arrivals(mut self, hide: bool) -> Self {
    self.hide_new_posts = hide;
    self
  }

  /// Run the poller on its own task until `cancel` fires.
  pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<Cancelled> {
    tokio::spawn(async move { self.run(cancel).await })
  }

  /// Wait, poll, merge, repeat. Returns only once `cancel` fires, whether
  /// that happens during the wait or while a cycle is in flight.
  pub async fn run(&self, cancel: CancellationToken) -> Cancelled {
    info!(
      interval = ?self.interval,
      hide_new_posts = self.hide_new_posts,
      "starting newer-posts poller"
    );

    loop {
      tokio::select! {
        biased;
        _ = cancel.cancelled() => break,
        _ = tokio::time::sleep(self.interval) => {}
      }

      let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => break,
        outcome = self.poll_once() => outcome,
      };

      match outcome {
        Ok(count) => {
          debug!(count, "poll cycle merged newer posts");
          self.publish(SyncEvent::NewPosts { count });
        }
        Err(err) => {
          warn!(error = %err, "poll cycle failed");
          self.publish(SyncEvent::PollFailed(err));
        }
      }
    }

    debug!("newer-posts poller cancelled");
    Cancelled
  }

  /// One cycle: read the high-water mark, fetch newer posts, merge them.
  ///
  /// Returns how many posts were merged. A successful response without a
  /// body counts as no new posts.
  pub async fn poll_once(&self) -> Result<usize, SyncError> {
    let since_id = self
      .store
      .latest()?
      .map(|record| record.post.id)
      .unwrap_or(0);

    let response = self.api.get_newer(since_id).await?;
    response.ensure_success()?;

    let posts = response.body.unwrap_or_default();
    let count = posts.len();
    self
      .store
      .upsert_many(&PostRecord::from_posts(posts, !self.hide_new_posts))?;

    Ok(count)
  }

  fn publish(&self, event: SyncEvent) {
    // Nobody listening is fine; polling still keeps the cache fresh.
    let _ = self.events.send(event);
  }
}
