use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ServerConfig;
use crate::error::RemoteError;

use super::{ApiResponse, Post};

/// Remote source of truth for posts.
///
/// Implementations return `Err` only when no usable response was obtained.
/// A response with a failing status is still `Ok` and is judged by the caller.
#[async_trait]
pub trait PostsApi: Send + Sync {
  async fn get_all(&self) -> Result<ApiResponse<Vec<Post>>, RemoteError>;

  /// Posts with an id strictly greater than `since_id`.
  async fn get_newer(&self, since_id: i64) -> Result<ApiResponse<Vec<Post>>, RemoteError>;

  async fn save(&self, post: &Post) -> Result<ApiResponse<Post>, RemoteError>;

  /// Success carries no payload.
  async fn remove_by_id(&self, id: i64) -> Result<ApiResponse<()>, RemoteError>;

  async fn like_by_id(&self, id: i64) -> Result<ApiResponse<Post>, RemoteError>;
}

/// HTTP client for the posts service
#[derive(Clone)]
pub struct HttpPostsApi {
  client: reqwest::Client,
  base: Url,
}

impl HttpPostsApi {
  pub fn new(config: &ServerConfig) -> Result<Self> {
    let base = base_url(&config.url)?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base })
  }

  fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
    self
      .base
      .join(path)
      .map_err(|e| RemoteError::Other(format!("Invalid endpoint {}: {}", path, e)))
  }

  /// Send a request and decode a JSON body from a successful response.
  async fn send<T: DeserializeOwned>(
    &self,
    request: RequestBuilder,
  ) -> Result<ApiResponse<T>, RemoteError> {
    let response = request.send().await?;
    let status = response.status();
    let message = status.canonical_reason().unwrap_or_default();
    debug!(status = status.as_u16(), url = %response.url(), "posts service responded");

    if !status.is_success() {
      return Ok(ApiResponse::new(status.as_u16(), message, None));
    }

    let bytes = response.bytes().await?;
    let body = if bytes.is_empty() {
      None
    } else {
      Some(serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))?)
    };

    Ok(ApiResponse::new(status.as_u16(), message, body))
  }

  /// Send a request whose successful response has no payload.
  async fn send_empty(&self, request: RequestBuilder) -> Result<ApiResponse<()>, RemoteError> {
    let response = request.send().await?;
    let status = response.status();
    let message = status.canonical_reason().unwrap_or_default();
    debug!(status = status.as_u16(), url = %response.url(), "posts service responded");

    let body = status.is_success().then_some(());
    Ok(ApiResponse::new(status.as_u16(), message, body))
  }
}

#[async_trait]
impl PostsApi for HttpPostsApi {
  async fn get_all(&self) -> Result<ApiResponse<Vec<Post>>, RemoteError> {
    let url = self.endpoint("api/posts")?;
    self.send(self.client.get(url)).await
  }

  async fn get_newer(&self, since_id: i64) -> Result<ApiResponse<Vec<Post>>, RemoteError> {
    let url = self.endpoint(&format!("api/posts/{}/newer", since_id))?;
    self.send(self.client.get(url)).await
  }

  async fn save(&self, post: &Post) -> Result<ApiResponse<Post>, RemoteError> {
    let url = self.endpoint("api/posts")?;
    let payload = serde_json::to_vec(post)
      .map_err(|e| RemoteError::Other(format!("Failed to encode post: {}", e)))?;

    let request = self
      .client
      .post(url)
      .header(CONTENT_TYPE, "application/json")
      .body(payload);
    self.send(request).await
  }

  async fn remove_by_id(&self, id: i64) -> Result<ApiResponse<()>, RemoteError> {
    let url = self.endpoint(&format!("api/posts/{}", id))?;
    self.send_empty(self.client.delete(url)).await
  }

  async fn like_by_id(&self, id: i64) -> Result<ApiResponse<Post>, RemoteError> {
    let url = self.endpoint(&format!("api/posts/{}/likes", id))?;
    self.send(self.client.post(url)).await
  }
}

/// Parse the configured server url so relative endpoints join beneath it.
fn base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw).map_err(|e| eyre!("Invalid server url '{}': {}", raw, e))?;

  if url.cannot_be_a_base() {
    return Err(eyre!("Server url '{}' cannot be used as a base", raw));
  }

  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }

  Ok(url)
}
