use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default location of the shared credentials file.
pub const DEFAULT_CREDENTIALS_FILE: &str = "~/.aws/credentials";

/// Default bound applied to every control-plane call.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

/// Role assumed by route integrations and attached to created functions.
pub const DEFAULT_EXECUTION_ROLE: &str = "TetherInvokeRole";

/// Provider-level configuration.
///
/// Created once when the provider is configured and kept for the lifetime
/// of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
  /// Application name, used to key the registry table.
  pub app_name: String,

  /// Region where operations take place. When empty, `AWS_REGION` and then
  /// `AWS_DEFAULT_REGION` are consulted.
  #[serde(default)]
  pub region: String,

  #[serde(default)]
  pub access_key: String,

  #[serde(default)]
  pub secret_key: String,

  #[serde(default)]
  pub token: String,

  /// Profile name inside the shared credentials file.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub profile: Option<String>,

  /// Path of the shared credentials file, may start with `~`.
  #[serde(default = "default_credentials_file")]
  pub shared_credentials_file: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assume_role: Option<AssumeRoleConfig>,

  /// Skip the "who am I" call. Resolution then succeeds on configuration
  /// alone, even with invalid credentials.
  #[serde(default)]
  pub skip_credentials_validation: bool,

  #[serde(default)]
  pub skip_region_validation: bool,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub allowed_account_ids: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub forbidden_account_ids: Vec<String>,

  /// Per-service endpoint overrides, keyed by service name (`lambda`, `sqs`, ...).
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub endpoints: HashMap<String, String>,

  #[serde(default = "default_call_timeout_ms")]
  pub call_timeout_ms: u64,

  #[serde(default = "default_execution_role")]
  pub execution_role_name: String,
}

impl ProviderConfig {
  /// Create a configuration with every optional setting at its default.
  pub fn new(app_name: impl Into<String>, region: impl Into<String>) -> Self {
    Self {
      app_name: app_name.into(),
      region: region.into(),
      access_key: String::new(),
      secret_key: String::new(),
      token: String::new(),
      profile: None,
      shared_credentials_file: default_credentials_file(),
      assume_role: None,
      skip_credentials_validation: false,
      skip_region_validation: false,
      allowed_account_ids: Vec::new(),
      forbidden_account_ids: Vec::new(),
      endpoints: HashMap::new(),
      call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
      execution_role_name: default_execution_role(),
    }
  }

  /// The caller-supplied bound for a single external call.
  pub fn call_timeout(&self) -> Duration {
    Duration::from_millis(self.call_timeout_ms)
  }

  /// Endpoint override for a service, if any.
  pub fn endpoint(&self, service: &str) -> Option<&str> {
    self
      .endpoints
      .get(service)
      .map(String::as_str)
      .filter(|url| !url.is_empty())
  }
}

/// Role to assume on top of the base credential chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssumeRoleConfig {
  pub role_arn: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub external_id: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub session_name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duration_seconds: Option<u32>,

  /// Inline session policy document (JSON).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub policy: Option<String>,

  /// Managed policies attached to the session.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub policy_arns: Vec<String>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub tags: BTreeMap<String, String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub transitive_tag_keys: Vec<String>,
}

fn default_credentials_file() -> String {
  DEFAULT_CREDENTIALS_FILE.to_string()
}

fn default_call_timeout_ms() -> u64 {
  DEFAULT_CALL_TIMEOUT_MS
}

fn default_execution_role() -> String {
  DEFAULT_EXECUTION_ROLE.to_string()
}
