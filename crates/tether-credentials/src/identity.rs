use tether_capability::Credentials;

use crate::source::CredentialSource;

/// A resolved, validated identity.
///
/// Produced once per provider configuration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub credentials: Credentials,
  /// Empty when validation was skipped and no role ARN named the account.
  pub account_id: String,
  pub partition: String,
  pub region: String,
  pub source: CredentialSource,
}

impl Identity {
  pub fn provider_name(&self) -> &'static str {
    self.source.name()
  }
}
