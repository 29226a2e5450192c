//! In-memory [`Remote`] used by coordinator and profile tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{ApiError, ApiResult, Remote};
use crate::types::{Mix, Profile};

#[derive(Default)]
pub struct FakeRemote {
  pub mixes: Mutex<Vec<Mix>>,
  pub profiles: Mutex<Vec<Profile>>,
  calls: Mutex<Vec<String>>,
  /// Upcoming reads that report a cold server
  cold_reads: AtomicUsize,
  /// Status returned by every read while set
  failing_reads: Mutex<Option<u16>>,
  /// Status returned by every write while set
  failing_writes: Mutex<Option<u16>>,
  latency: Mutex<Duration>,
  /// Take the mix list before waiting out the latency
  early_reads: AtomicBool,
}

impl FakeRemote {
  pub fn with_mixes(mixes: Vec<Mix>) -> Self {
    let fake = Self::default();
    *fake.mixes.lock().unwrap() = mixes;
    fake
  }

  pub fn with_profiles(profiles: Vec<Profile>) -> Self {
    let fake = Self::default();
    *fake.profiles.lock().unwrap() = profiles;
    fake
  }

  pub fn cold_for(&self, reads: usize) {
    self.cold_reads.store(reads, Ordering::SeqCst);
  }

  pub fn always_cold(&self) {
    self.cold_for(usize::MAX);
  }

  pub fn fail_reads(&self, status: Option<u16>) {
    *self.failing_reads.lock().unwrap() = status;
  }

  pub fn fail_writes(&self, status: Option<u16>) {
    *self.failing_writes.lock().unwrap() = status;
  }

  pub fn set_latency(&self, latency: Duration) {
    *self.latency.lock().unwrap() = latency;
  }

  pub fn read_before_latency(&self) {
    self.early_reads.store(true, Ordering::SeqCst);
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  pub fn count(&self, prefix: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| c.starts_with(prefix))
      .count()
  }

  fn record(&self, call: String) {
    self.calls.lock().unwrap().push(call);
  }

  async fn read(&self) -> ApiResult<()> {
    let latency = *self.latency.lock().unwrap();
    if !latency.is_zero() {
      tokio::time::sleep(latency).await;
    }
    let cold = self
      .cold_reads
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
        if n == usize::MAX {
          Some(n)
        } else {
          n.checked_sub(1)
        }
      })
      .is_ok();
    if cold {
      return Err(ApiError::ServerWakingUp);
    }
    match *self.failing_reads.lock().unwrap() {
      Some(status) => Err(ApiError::ServerError {
        status,
        message: Some("boom".to_string()),
      }),
      None => Ok(()),
    }
  }

  fn write(&self) -> ApiResult<()> {
    match *self.failing_writes.lock().unwrap() {
      Some(status) => Err(ApiError::ServerError {
        status,
        message: None,
      }),
      None => Ok(()),
    }
  }

  fn not_found() -> ApiError {
    ApiError::ServerError {
      status: 404,
      message: Some("not found".to_string()),
    }
  }
}

#[async_trait]
impl Remote for FakeRemote {
  async fn fetch_mixes(&self, profile_id: &str) -> ApiResult<Vec<Mix>> {
    self.record(format!("fetch_mixes:{profile_id}"));
    let early = self
      .early_reads
      .load(Ordering::SeqCst)
      .then(|| self.mixes.lock().unwrap().clone());
    self.read().await?;
    Ok(early.unwrap_or_else(|| self.mixes.lock().unwrap().clone()))
  }

  async fn create_mix(&self, mix: &Mix) -> ApiResult<Mix> {
    self.record(format!("create_mix:{}", mix.id));
    self.write()?;
    self.mixes.lock().unwrap().push(mix.clone());
    Ok(mix.clone())
  }

  async fn update_mix(&self, mix: &Mix) -> ApiResult<Mix> {
    self.record(format!("update_mix:{}", mix.id));
    self.write()?;
    let mut mixes = self.mixes.lock().unwrap();
    let slot = mixes
      .iter_mut()
      .find(|m| m.id == mix.id)
      .ok_or_else(Self::not_found)?;
    *slot = mix.clone();
    Ok(mix.clone())
  }

  async fn delete_mix(&self, id: &str) -> ApiResult<()> {
    self.record(format!("delete_mix:{id}"));
    self.write()?;
    let mut mixes = self.mixes.lock().unwrap();
    let before = mixes.len();
    mixes.retain(|m| m.id != id);
    if mixes.len() == before {
      return Err(Self::not_found());
    }
    Ok(())
  }

  async fn fetch_profiles(&self) -> ApiResult<Vec<Profile>> {
    self.record("fetch_profiles".to_string());
    self.read().await?;
    Ok(self.profiles.lock().unwrap().clone())
  }

  async fn create_profile(&self, name: &str) -> ApiResult<Profile> {
    self.record(format!("create_profile:{name}"));
    self.write()?;
    let mut profiles = self.profiles.lock().unwrap();
    let profile = Profile {
      id: format!("p{}", profiles.len() + 1),
      name: name.to_string(),
      is_active: false,
      created_at: None,
      updated_at: None,
    };
    profiles.push(profile.clone());
    Ok(profile)
  }

  async fn update_profile(&self, profile: &Profile) -> ApiResult<Profile> {
    self.record(format!("update_profile:{}", profile.id));
    self.write()?;
    let mut profiles = self.profiles.lock().unwrap();
    let slot = profiles
      .iter_mut()
      .find(|p| p.id == profile.id)
      .ok_or_else(Self::not_found)?;
    *slot = profile.clone();
    Ok(profile.clone())
  }

  async fn delete_profile(&self, id: &str) -> ApiResult<()> {
    self.record(format!("delete_profile:{id}"));
    self.write()?;
    self.profiles.lock().unwrap().retain(|p| p.id != id);
    Ok(())
  }

  fn set_base_url(&self, url: &str) -> ApiResult<()> {
    self.record(format!("set_base_url:{url}"));
    super::validate_base_url(url).map(|_| ())
  }
}
