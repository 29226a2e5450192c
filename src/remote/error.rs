use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failures talking to the remote catalog.
///
/// Only [`ApiError::ServerWakingUp`] is ever retried automatically, and only
/// on the read path.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("invalid server URL {0:?}: expected an http:// or https:// address")]
  InvalidUrl(String),

  #[error("invalid response from server")]
  InvalidResponse,

  #[error("server error ({status}){}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
  ServerError { status: u16, message: Option<String> },

  #[error("network error: {0}")]
  Network(#[source] reqwest::Error),

  #[error("failed to decode server response: {0}")]
  Decoding(#[source] serde_json::Error),

  #[error("server is waking up, try again shortly")]
  ServerWakingUp,
}

impl ApiError {
  /// Cold-start condition, eligible for bounded automatic retry on reads.
  pub fn is_transient(&self) -> bool {
    matches!(self, ApiError::ServerWakingUp)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_server_error_message() {
    let err = ApiError::ServerError {
      status: 404,
      message: Some("Mix not found".to_string()),
    };
    assert_eq!(err.to_string(), "server error (404): Mix not found");

    let err = ApiError::ServerError {
      status: 500,
      message: None,
    };
    assert_eq!(err.to_string(), "server error (500)");
  }

  #[test]
  fn test_only_cold_start_is_transient() {
    assert!(ApiError::ServerWakingUp.is_transient());
    assert!(!ApiError::InvalidResponse.is_transient());
    assert!(!ApiError::InvalidUrl(String::new()).is_transient());
  }
}
