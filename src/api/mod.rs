//! Remote posts service: the trait the sync engine talks to and its HTTP
//! implementation.

mod client;
#[cfg(test)]
pub mod fake;
mod types;

pub use client::{HttpPostsApi, PostsApi};
pub use types::{ApiResponse, Post};
