use thiserror::Error;

use crate::remote::ApiError;

/// Failures of coordinator and profile operations.
#[derive(Debug, Error)]
pub enum SyncError {
  #[error("no mix with id {0}")]
  UnknownMix(String),

  #[error("no profile with id {0}")]
  UnknownProfile(String),

  #[error("no active profile")]
  NoActiveProfile,

  #[error("import stopped after {created} mixes: {source}")]
  PartialImport {
    created: usize,
    #[source]
    source: ApiError,
  },

  #[error(transparent)]
  Api(#[from] ApiError),
}
