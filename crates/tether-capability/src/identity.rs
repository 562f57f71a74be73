use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CapabilityError;

/// An access key pair with an optional session token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub access_key_id: String,
  pub secret_access_key: String,
  pub session_token: Option<String>,
}

impl Credentials {
  pub fn new(
    access_key_id: impl Into<String>,
    secret_access_key: impl Into<String>,
    session_token: Option<String>,
  ) -> Self {
    Self {
      access_key_id: access_key_id.into(),
      secret_access_key: secret_access_key.into(),
      session_token: session_token.filter(|t| !t.is_empty()),
    }
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("access_key_id", &self.access_key_id)
      .field("secret_access_key", &"** redacted **")
      .field(
        "session_token",
        &self.session_token.as_ref().map(|_| "** redacted **"),
      )
      .finish()
  }
}

/// Result of a "who am I" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
  pub account_id: String,
  pub arn: String,
  pub partition: String,
}

/// Parameters of an assume-role exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssumeRoleRequest {
  pub role_arn: String,
  pub session_name: String,
  pub external_id: Option<String>,
  pub duration_seconds: Option<u32>,
  /// Inline session policy document.
  pub policy: Option<String>,
  pub policy_arns: Vec<String>,
  pub tags: BTreeMap<String, String>,
  pub transitive_tag_keys: Vec<String>,
}

/// The identity provider, called with some set of credentials.
#[async_trait]
pub trait IdentityClient: Send + Sync {
  async fn get_caller_identity(&self) -> Result<CallerIdentity, CapabilityError>;

  async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<Credentials, CapabilityError>;
}

/// Builds an [`IdentityClient`] for a credential set and region.
pub trait IdentityConnector: Send + Sync {
  fn connect(&self, credentials: &Credentials, region: &str) -> Arc<dyn IdentityClient>;
}
