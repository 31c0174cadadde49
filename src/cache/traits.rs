//! Core traits and types for the local post cache.

use color_eyre::Result;
use futures::stream::BoxStream;

use crate::api::Post;

/// A post as persisted in the local cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
  pub post: Post,
  /// Hidden records stay in the cache (and count towards the high-water
  /// mark) but are left out of the feed until revealed.
  pub visible: bool,
}

impl PostRecord {
  pub fn new(post: Post, visible: bool) -> Self {
    Self { post, visible }
  }

  pub fn from_posts(posts: Vec<Post>, visible: bool) -> Vec<Self> {
    posts
      .into_iter()
      .map(|post| Self::new(post, visible))
      .collect()
  }
}

/// Local persistent store for posts.
///
/// Implementations must be safe to share between the poller task and any
/// number of foreground commands: every write is atomic, and readers never
/// observe a half-applied batch.
pub trait PostStore: Send + Sync {
  /// Live view of every record, newest id first.
  ///
  /// The stream yields the current contents on first poll, then again after
  /// each committed change. Rapid changes may be coalesced into one emission.
  fn observe_all(&self) -> BoxStream<'static, Vec<PostRecord>>;

  /// Insert or overwrite records by id.
  fn upsert_many(&self, records: &[PostRecord]) -> Result<()>;

  /// Replace a post's fields, keeping the record's visibility. A post not
  /// cached yet is inserted visible.
  fn update_post(&self, post: &Post) -> Result<()>;

  fn remove_by_id(&self, id: i64) -> Result<()>;

  /// The record with the greatest id, hidden or not.
  fn latest(&self) -> Result<Option<PostRecord>>;

  /// Mark a post liked by the current user, bumping its like count once.
  fn like_by_id(&self, id: i64) -> Result<()>;

  /// Reveal every hidden record.
  fn set_all_visible(&self) -> Result<()>;
}
