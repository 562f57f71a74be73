//! Capability error types.

use std::time::Duration;

/// Errors returned by control-plane capabilities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
  /// The addressed object does not exist.
  #[error("{what} not found")]
  NotFound { what: String },

  /// The request conflicts with existing control-plane state.
  #[error("conflict: {message}")]
  Conflict { message: String },

  /// The request was malformed before it reached the service.
  #[error("invalid request: {message}")]
  InvalidRequest { message: String },

  /// The service rejected or failed the call.
  #[error("{service} call failed: {message}")]
  Service { service: String, message: String },

  /// The call did not complete within the caller-supplied bound.
  #[error("call timed out after {after:?}")]
  Timeout { after: Duration },
}

impl CapabilityError {
  pub fn not_found(what: impl Into<String>) -> Self {
    Self::NotFound { what: what.into() }
  }

  pub fn conflict(message: impl Into<String>) -> Self {
    Self::Conflict {
      message: message.into(),
    }
  }

  pub fn invalid_request(message: impl Into<String>) -> Self {
    Self::InvalidRequest {
      message: message.into(),
    }
  }

  pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Service {
      service: service.into(),
      message: message.into(),
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }
}
