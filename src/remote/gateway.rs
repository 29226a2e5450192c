//! HTTP gateway to the mix catalog REST API.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use super::api_types::{ApiErrorBody, NewProfile};
use super::error::{ApiError, ApiResult};
use super::retry::ColdStartPolicy;
use super::Remote;
use crate::types::{Entity, Mix, Profile};

/// Per-request timeouts. The data timeouts are long because a cold service
/// can take tens of seconds to answer its first request.
#[derive(Debug, Clone)]
pub struct Timeouts {
  pub health: Duration,
  pub read: Duration,
  pub write: Duration,
}

impl Default for Timeouts {
  fn default() -> Self {
    Self {
      health: Duration::from_secs(5),
      read: Duration::from_secs(60),
      write: Duration::from_secs(60),
    }
  }
}

/// REST client wrapper. Constructed once and shared by reference.
pub struct RemoteGateway {
  http: reqwest::Client,
  base_url: RwLock<String>,
  timeouts: Timeouts,
  policy: ColdStartPolicy,
}

/// Check that `raw` is a usable http(s) base URL.
pub fn validate_base_url(raw: &str) -> ApiResult<Url> {
  let trimmed = raw.trim();
  if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
    return Err(ApiError::InvalidUrl(raw.to_string()));
  }
  Url::parse(trimmed).map_err(|_| ApiError::InvalidUrl(raw.to_string()))
}

impl RemoteGateway {
  pub fn new(base_url: String, timeouts: Timeouts, policy: ColdStartPolicy) -> ApiResult<Self> {
    let http = reqwest::Client::builder()
      .build()
      .map_err(ApiError::Network)?;

    Ok(Self {
      http,
      base_url: RwLock::new(base_url),
      timeouts,
      policy,
    })
  }

  pub fn base_url(&self) -> String {
    self
      .base_url
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  /// Build `<base>/<segments...>`, failing with `InvalidUrl` before any I/O.
  fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
    let base = self.base_url();
    let mut url = validate_base_url(&base)?;
    url
      .path_segments_mut()
      .map_err(|_| ApiError::InvalidUrl(base.clone()))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  /// Lightweight readiness probe; any failure means the service is cold.
  async fn probe(&self) -> bool {
    let url = match self.endpoint(&["health"]) {
      Ok(url) => url,
      Err(_) => return false,
    };

    match self.http.get(url).timeout(self.timeouts.health).send().await {
      Ok(response) if response.status().is_success() => true,
      Ok(response) => {
        debug!(status = response.status().as_u16(), "health probe rejected");
        false
      }
      Err(e) => {
        debug!(error = %e, "health probe failed");
        false
      }
    }
  }

  /// Report whether the service currently answers its health probe.
  pub async fn health(&self) -> ApiResult<bool> {
    self.endpoint(&[])?;
    Ok(self.probe().await)
  }

  /// Fetch a whole collection, waiting out a cold start with backoff.
  pub async fn fetch_all<T: Entity>(&self, query: &[(&str, &str)]) -> ApiResult<Vec<T>> {
    let kind = T::kind().path();
    let mut url = self.endpoint(&[kind])?;
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query.iter().copied());
    }

    let mut attempt = 0;
    loop {
      if self.probe().await {
        let request = self.http.get(url.clone()).timeout(self.timeouts.read);
        match request.send().await {
          // the read timeout also covers the body
          Ok(response) => match read_json(response).await {
            Err(ApiError::ServerWakingUp) => {
              debug!(kind, "response body timed out, treating server as cold")
            }
            result => return result,
          },
          Err(e) if e.is_timeout() => debug!(kind, "request timed out, treating server as cold"),
          Err(e) => return Err(ApiError::Network(e)),
        }
      }

      attempt += 1;
      if !self.policy.allows(attempt) {
        warn!(kind, attempts = attempt, "server still cold, giving up");
        return Err(ApiError::ServerWakingUp);
      }

      let delay = self.policy.backoff(attempt);
      info!(kind, attempt, ?delay, "server appears cold, backing off");
      sleep(delay).await;
    }
  }

  /// `POST /<kind>`. Single attempt; a timeout is reported, not retried.
  pub async fn create<T, B>(&self, body: &B) -> ApiResult<T>
  where
    T: Entity,
    B: Serialize + ?Sized,
  {
    let url = self.endpoint(&[T::kind().path()])?;
    let request = self.http.post(url);
    let response = self.send_write(with_json(request, body)?).await?;
    read_json(response).await
  }

  /// `PUT /<kind>/:id` with the full entity.
  pub async fn update<T: Entity>(&self, entity: &T) -> ApiResult<T> {
    let url = self.endpoint(&[T::kind().path(), entity.id()])?;
    let request = self.http.put(url);
    let response = self.send_write(with_json(request, entity)?).await?;
    read_json(response).await
  }

  /// `DELETE /<kind>/:id`.
  pub async fn delete<T: Entity>(&self, id: &str) -> ApiResult<()> {
    let url = self.endpoint(&[T::kind().path(), id])?;
    let response = self.send_write(self.http.delete(url)).await?;
    let status = response.status();
    if status.is_success() {
      return Ok(());
    }
    let body = response.bytes().await.unwrap_or_default();
    Err(server_error(status, &body))
  }

  async fn send_write(&self, request: RequestBuilder) -> ApiResult<Response> {
    request
      .timeout(self.timeouts.write)
      .send()
      .await
      .map_err(|e| {
        if e.is_timeout() {
          warn!("write timed out, server is probably waking up");
          ApiError::ServerWakingUp
        } else {
          ApiError::Network(e)
        }
      })
  }
}

#[async_trait]
impl Remote for RemoteGateway {
  async fn fetch_mixes(&self, profile_id: &str) -> ApiResult<Vec<Mix>> {
    self.fetch_all(&[("profileId", profile_id)]).await
  }

  async fn create_mix(&self, mix: &Mix) -> ApiResult<Mix> {
    self.create(mix).await
  }

  async fn update_mix(&self, mix: &Mix) -> ApiResult<Mix> {
    self.update(mix).await
  }

  async fn delete_mix(&self, id: &str) -> ApiResult<()> {
    self.delete::<Mix>(id).await
  }

  async fn fetch_profiles(&self) -> ApiResult<Vec<Profile>> {
    self.fetch_all(&[]).await
  }

  async fn create_profile(&self, name: &str) -> ApiResult<Profile> {
    self.create(&NewProfile { name }).await
  }

  async fn update_profile(&self, profile: &Profile) -> ApiResult<Profile> {
    self.update(profile).await
  }

  async fn delete_profile(&self, id: &str) -> ApiResult<()> {
    self.delete::<Profile>(id).await
  }

  fn set_base_url(&self, url: &str) -> ApiResult<()> {
    validate_base_url(url)?;
    let mut base = self.base_url.write().unwrap_or_else(|e| e.into_inner());
    *base = url.trim().to_string();
    info!(base_url = %*base, "server base URL changed");
    Ok(())
  }
}

fn with_json<B: Serialize + ?Sized>(request: RequestBuilder, body: &B) -> ApiResult<RequestBuilder> {
  let bytes = serde_json::to_vec(body).map_err(ApiError::Decoding)?;
  Ok(request.header(CONTENT_TYPE, "application/json").body(bytes))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
  let status = response.status();
  let body = response.bytes().await.map_err(|e| {
    if e.is_timeout() {
      ApiError::ServerWakingUp
    } else {
      debug!(error = %e, "failed to read response body");
      ApiError::InvalidResponse
    }
  })?;
  classify(status, &body)
}

/// Map a status and body to a decoded value or the matching error.
fn classify<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> ApiResult<T> {
  if !status.is_success() {
    return Err(server_error(status, body));
  }
  serde_json::from_slice(body).map_err(ApiError::Decoding)
}

fn server_error(status: StatusCode, body: &[u8]) -> ApiError {
  let message = serde_json::from_slice::<ApiErrorBody>(body)
    .ok()
    .map(|b| b.message);
  ApiError::ServerError {
    status: status.as_u16(),
    message,
  }
}
