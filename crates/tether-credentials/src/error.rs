use tether_capability::CapabilityError;

/// Errors raised while resolving provider credentials.
///
/// Both variants are fatal at configuration time: no capability handles
/// are built from a failed resolution.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
  /// The configuration is unusable as written (bad region, no credential
  /// source, conflicting options, disallowed account).
  #[error("configuration error: {message}")]
  Configuration { message: String },

  /// The identity provider rejected the credentials or the role exchange.
  #[error("authentication error: {message}")]
  Authentication {
    message: String,
    #[source]
    source: CapabilityError,
  },
}

impl CredentialError {
  pub fn configuration(message: impl Into<String>) -> Self {
    Self::Configuration {
      message: message.into(),
    }
  }

  pub fn authentication(message: impl Into<String>, source: CapabilityError) -> Self {
    Self::Authentication {
      message: message.into(),
      source,
    }
  }
}
