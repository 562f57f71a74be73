use std::collections::BTreeMap;
use std::path::PathBuf;

use tether_capability::Credentials;

/// Where a resolved identity's credentials came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
  Static(Credentials),
  Environment,
  SharedProfile {
    profile: String,
    file: PathBuf,
  },
  AssumedRole {
    base: Box<CredentialSource>,
    role_arn: String,
    external_id: Option<String>,
    session_name: String,
    duration_seconds: Option<u32>,
    policy_arns: Vec<String>,
    session_tags: BTreeMap<String, String>,
    transitive_tag_keys: Vec<String>,
  },
}

impl CredentialSource {
  /// Short provider name, used in logs and `whoami` output.
  pub fn name(&self) -> &'static str {
    match self {
      CredentialSource::Static(_) => "static",
      CredentialSource::Environment => "environment",
      CredentialSource::SharedProfile { .. } => "shared-profile",
      CredentialSource::AssumedRole { .. } => "assume-role",
    }
  }

  /// The provider that produced the base credentials, looking through any
  /// role exchange.
  pub fn base(&self) -> &CredentialSource {
    match self {
      CredentialSource::AssumedRole { base, .. } => base.base(),
      other => other,
    }
  }
}
