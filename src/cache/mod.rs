//! Local post cache.
//!
//! The cache is the single point of truth the feed observes:
//! - Records are upserted by id, never duplicated
//! - Every committed write is pushed to live observers
//! - Hidden records are kept but left out of the feed until revealed

mod storage;
mod traits;

pub use storage::SqliteStore;
pub use traits::{PostRecord, PostStore};
