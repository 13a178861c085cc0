//! Structured error types for the calc engine.
//!
//! Only configuration and input-shape problems are errors. Numerically degenerate
//! results inside the engine are "not computed" values, never errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalcError {
  #[error("config: {field}: {reason}")]
  Config { field: String, reason: String },

  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),
}

impl CalcError {
  pub fn config(field: &str, reason: &str) -> Self {
    Self::Config {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  /// The offending field, if the error names one.
  pub fn field(&self) -> Option<&str> {
    match self {
      Self::Config { field, .. } | Self::Validation { field, .. } => Some(field),
      Self::Json(_) | Self::Io(_) => None,
    }
  }
}
