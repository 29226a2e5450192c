//! Request and response bodies that are not domain entities.

use serde::{Deserialize, Serialize};

/// Error payload returned by the server alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub message: String,
}

/// `POST /profiles` accepts only a name; the server assigns everything else.
#[derive(Debug, Serialize)]
pub struct NewProfile<'a> {
  pub name: &'a str,
}
