//! SQLite-backed post store.

use color_eyre::{eyre::eyre, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::api::Post;

use super::traits::{PostRecord, PostStore};

/// SQLite-based post store.
///
/// Writers bump a version counter after each committed change; every
/// [`PostStore::observe_all`] stream re-reads the table when it moves.
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
  changes: watch::Sender<u64>,
}

impl SqliteStore {
  /// Open (or create) the store at the given path.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    debug!(path = %path.display(), "opened post cache");
    Self::from_connection(conn)
  }

  /// A throwaway store that lives only as long as this value.
  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::from_connection(conn)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("feedsync").join("cache.db"))
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    let (changes, _) = watch::channel(0);
    Ok(Self {
      conn: Arc::new(Mutex::new(conn)),
      changes,
    })
  }

  fn notify(&self) {
    self.changes.send_modify(|version| *version = version.wrapping_add(1));
  }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY,
    author TEXT NOT NULL,
    author_avatar TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL,
    published INTEGER NOT NULL DEFAULT 0,
    liked_by_me INTEGER NOT NULL DEFAULT 0,
    likes INTEGER NOT NULL DEFAULT 0,
    visible INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_posts_visible ON posts(visible);
"#;

const COLUMNS: &str = "id, author, author_avatar, content, published, liked_by_me, likes, visible";

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
  conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
  Ok(PostRecord {
    post: Post {
      id: row.get(0)?,
      author: row.get(1)?,
      author_avatar: row.get(2)?,
      content: row.get(3)?,
      published: row.get(4)?,
      liked_by_me: row.get(5)?,
      likes: row.get(6)?,
    },
    visible: row.get(7)?,
  })
}

fn query_all(conn: &Connection) -> Result<Vec<PostRecord>> {
  let mut stmt = conn
    .prepare(&format!("SELECT {} FROM posts ORDER BY id DESC", COLUMNS))
    .map_err(|e| eyre!("Failed to prepare posts query: {}", e))?;

  let records = stmt
    .query_map([], record_from_row)
    .map_err(|e| eyre!("Failed to query posts: {}", e))?
    .collect::<rusqlite::Result<Vec<_>>>()
    .map_err(|e| eyre!("Failed to read post row: {}", e))?;

  Ok(records)
}

impl PostStore for SqliteStore {
  fn observe_all(&self) -> BoxStream<'static, Vec<PostRecord>> {
    let conn = Arc::clone(&self.conn);

    WatchStream::new(self.changes.subscribe())
      .filter_map(move |_version| {
        let conn = Arc::clone(&conn);
        async move {
          match lock(&conn).and_then(|conn| query_all(&conn)) {
            Ok(records) => Some(records),
            Err(e) => {
              warn!(error = %e, "failed to read cached posts");
              None
            }
          }
        }
      })
      .boxed()
  }

  fn upsert_many(&self, records: &[PostRecord]) -> Result<()> {
    if records.is_empty() {
      return Ok(());
    }

    {
      let mut conn = lock(&self.conn)?;
      let tx = conn
        .transaction()
        .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

      {
        let mut stmt = tx
          .prepare(&format!(
            "INSERT OR REPLACE INTO posts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            COLUMNS
          ))
          .map_err(|e| eyre!("Failed to prepare upsert: {}", e))?;

        for record in records {
          let post = &record.post;
          stmt
            .execute(params![
              post.id,
              post.author,
              post.author_avatar,
              post.content,
              post.published,
              post.liked_by_me,
              post.likes,
              record.visible,
            ])
            .map_err(|e| eyre!("Failed to store post {}: {}", post.id, e))?;
        }
      }

      tx.commit()
        .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    }

    self.notify();
    Ok(())
  }

  fn update_post(&self, post: &Post) -> Result<()> {
    lock(&self.conn)?
      .execute(
        &format!(
          "INSERT INTO posts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, 1)
           ON CONFLICT(id) DO UPDATE SET
             author = excluded.author,
             author_avatar = excluded.author_avatar,
             content = excluded.content,
             published = excluded.published,
             liked_by_me = excluded.liked_by_me,
             likes = excluded.likes",
          COLUMNS
        ),
        params![
          post.id,
          post.author,
          post.author_avatar,
          post.content,
          post.published,
          post.liked_by_me,
          post.likes,
        ],
      )
      .map_err(|e| eyre!("Failed to update post {}: {}", post.id, e))?;

    self.notify();
    Ok(())
  }

  fn remove_by_id(&self, id: i64) -> Result<()> {
    let removed = lock(&self.conn)?
      .execute("DELETE FROM posts WHERE id = ?", params![id])
      .map_err(|e| eyre!("Failed to remove post {}: {}", id, e))?;

    if removed > 0 {
      self.notify();
    }
    Ok(())
  }

  fn latest(&self) -> Result<Option<PostRecord>> {
    let conn = lock(&self.conn)?;
    conn
      .query_row(
        &format!("SELECT {} FROM posts ORDER BY id DESC LIMIT 1", COLUMNS),
        [],
        record_from_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to query latest post: {}", e))
  }

  fn like_by_id(&self, id: i64) -> Result<()> {
    let changed = lock(&self.conn)?
      .execute(
        "UPDATE posts SET liked_by_me = 1, likes = MIN(likes + 1, ?)
         WHERE id = ? AND liked_by_me = 0",
        params![u32::MAX, id],
      )
      .map_err(|e| eyre!("Failed to like post {}: {}", id, e))?;

    if changed > 0 {
      self.notify();
    }
    Ok(())
  }

  fn set_all_visible(&self) -> Result<()> {
    let revealed = lock(&self.conn)?
      .execute("UPDATE posts SET visible = 1 WHERE visible = 0", [])
      .map_err(|e| eyre!("Failed to reveal hidden posts: {}", e))?;

    if revealed > 0 {
      debug!(revealed, "revealed hidden posts");
      self.notify();
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::post;

  fn ids(records: &[PostRecord]) -> Vec<i64> {
    records.iter().map(|r| r.post.id).collect()
  }

  #[test]
  fn test_upsert_overwrites_by_id() {
    let store = SqliteStore::in_memory().unwrap();

    let mut edited = post(2);
    edited.content = "edited".to_string();

    store
      .upsert_many(&PostRecord::from_posts(vec![post(1), post(2)], true))
      .unwrap();
    store.upsert_many(&[PostRecord::new(edited, true)]).unwrap();
    store.upsert_many(&[PostRecord::new(post(1), true)]).unwrap();

    let all = query_all(&lock(&store.conn).unwrap()).unwrap();
    assert_eq!(ids(&all), vec![2, 1]);
    assert_eq!(all[0].post.content, "edited");
  }

  #[test]
  fn test_latest_includes_hidden_records() {
    let store = SqliteStore::in_memory().unwrap();
    assert_eq!(store.latest().unwrap(), None);

    store
      .upsert_many(&PostRecord::from_posts(vec![post(3), post(1)], true))
      .unwrap();
    store.upsert_many(&[PostRecord::new(post(9), false)]).unwrap();

    let latest = store.latest().unwrap().unwrap();
    assert_eq!(latest.post.id, 9);
    assert!(!latest.visible);
  }

  #[test]
  fn test_like_is_applied_once() {
    let store = SqliteStore::in_memory().unwrap();
    store.upsert_many(&[PostRecord::new(post(5), true)]).unwrap();

    store.like_by_id(5).unwrap();
    store.like_by_id(5).unwrap();

    let liked = store.latest().unwrap().unwrap();
    assert!(liked.post.liked_by_me);
    assert_eq!(liked.post.likes, 1);
  }

  #[test]
  fn test_like_saturates_at_max_count() {
    let store = SqliteStore::in_memory().unwrap();
    let mut popular = post(5);
    popular.likes = u32::MAX;
    store.upsert_many(&[PostRecord::new(popular, true)]).unwrap();

    store.like_by_id(5).unwrap();

    let liked = store.latest().unwrap().unwrap();
    assert!(liked.post.liked_by_me);
    assert_eq!(liked.post.likes, u32::MAX);
  }

  #[test]
  fn test_update_post_keeps_visibility() {
    let store = SqliteStore::in_memory().unwrap();
    store.upsert_many(&[PostRecord::new(post(3), false)]).unwrap();

    let mut edited = post(3);
    edited.likes = 4;
    store.update_post(&edited).unwrap();
    store.update_post(&post(8)).unwrap();

    let all = query_all(&lock(&store.conn).unwrap()).unwrap();
    assert_eq!(ids(&all), vec![8, 3]);
    assert!(all[0].visible);
    assert!(!all[1].visible);
    assert_eq!(all[1].post.likes, 4);
  }

  #[test]
  fn test_remove_only_target() {
    let store = SqliteStore::in_memory().unwrap();
    store
      .upsert_many(&PostRecord::from_posts(vec![post(1), post(2), post(3)], true))
      .unwrap();

    store.remove_by_id(2).unwrap();
    store.remove_by_id(42).unwrap();

    let all = query_all(&lock(&store.conn).unwrap()).unwrap();
    assert_eq!(ids(&all), vec![3, 1]);
  }

  #[test]
  fn test_set_all_visible() {
    let store = SqliteStore::in_memory().unwrap();
    store
      .upsert_many(&PostRecord::from_posts(vec![post(1), post(2)], false))
      .unwrap();

    store.set_all_visible().unwrap();

    let all = query_all(&lock(&store.conn).unwrap()).unwrap();
    assert!(all.iter().all(|r| r.visible));
  }

  #[tokio::test]
  async fn test_observe_all_emits_snapshot_then_changes() {
    let store = SqliteStore::in_memory().unwrap();
    store.upsert_many(&[PostRecord::new(post(1), true)]).unwrap();

    let mut records = store.observe_all();
    assert_eq!(ids(&records.next().await.unwrap()), vec![1]);

    store
      .upsert_many(&PostRecord::from_posts(vec![post(2), post(1)], true))
      .unwrap();
    assert_eq!(ids(&records.next().await.unwrap()), vec![2, 1]);

    store.remove_by_id(1).unwrap();
    assert_eq!(ids(&records.next().await.unwrap()), vec![2]);
  }

  #[tokio::test]
  async fn test_observe_all_is_restartable() {
    let store = SqliteStore::in_memory().unwrap();
    store
      .upsert_many(&PostRecord::from_posts(vec![post(1), post(2)], true))
      .unwrap();

    let first = store.observe_all().next().await.unwrap();
    let second = store.observe_all().next().await.unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn test_open_creates_directories_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    {
      let store = SqliteStore::open(&path).unwrap();
      store.upsert_many(&[PostRecord::new(post(7), true)]).unwrap();
    }

    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(reopened.latest().unwrap().map(|r| r.post.id), Some(7));
  }
}
