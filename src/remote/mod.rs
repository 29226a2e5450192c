//! Remote catalog access.
//!
//! [`RemoteGateway`] talks to the REST service; everything above it depends
//! only on the [`Remote`] trait so it can be handed a gateway at startup (or a
//! fake in tests).

mod api_types;
mod error;
#[cfg(test)]
pub mod fake;
mod gateway;
mod retry;

use async_trait::async_trait;

pub use error::{ApiError, ApiResult};
pub use gateway::{validate_base_url, RemoteGateway, Timeouts};
pub use retry::ColdStartPolicy;

use crate::types::{Mix, Profile};

/// Operations the sync layer needs from the remote store.
///
/// Reads may wait out a cold start internally. Writes are attempted once.
#[async_trait]
pub trait Remote: Send + Sync {
  /// All mixes for a profile (`GET /mixes?profileId=`)
  async fn fetch_mixes(&self, profile_id: &str) -> ApiResult<Vec<Mix>>;

  async fn create_mix(&self, mix: &Mix) -> ApiResult<Mix>;

  async fn update_mix(&self, mix: &Mix) -> ApiResult<Mix>;

  async fn delete_mix(&self, id: &str) -> ApiResult<()>;

  async fn fetch_profiles(&self) -> ApiResult<Vec<Profile>>;

  /// Create a profile from a name; the server assigns id and timestamps
  async fn create_profile(&self, name: &str) -> ApiResult<Profile>;

  async fn update_profile(&self, profile: &Profile) -> ApiResult<Profile>;

  async fn delete_profile(&self, id: &str) -> ApiResult<()>;

  /// Point subsequent requests at a different server.
  fn set_base_url(&self, url: &str) -> ApiResult<()>;
}
