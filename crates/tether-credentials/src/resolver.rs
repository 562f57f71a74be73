use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tether_capability::{
  Arn, AssumeRoleRequest, Credentials, IdentityConnector, with_timeout,
};
use tether_config::{AssumeRoleConfig, ProviderConfig};
use tracing::{info, instrument};

use crate::error::CredentialError;
use crate::identity::Identity;
use crate::profile::expand_home;
use crate::provider::{
  CredentialChain, EnvLookup, EnvironmentProvider, SharedProfileProvider, StaticProvider,
  process_env,
};
use crate::region::{partition_for_region, validate_region};
use crate::source::CredentialSource;

const DEFAULT_SESSION_NAME: &str = "tether";
const MIN_ROLE_DURATION_SECS: u32 = 900;
const MAX_ROLE_DURATION_SECS: u32 = 43_200;

/// Turns a [`ProviderConfig`] into a validated [`Identity`].
pub struct CredentialResolver {
  connector: Arc<dyn IdentityConnector>,
  env: EnvLookup,
  home: Option<PathBuf>,
}

impl CredentialResolver {
  pub fn new(connector: Arc<dyn IdentityConnector>) -> Self {
    Self {
      connector,
      env: process_env(),
      home: dirs::home_dir(),
    }
  }

  /// Replace the process environment lookup.
  pub fn with_env(mut self, env: EnvLookup) -> Self {
    self.env = env;
    self
  }

  /// Replace the directory `~` expands to.
  pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
    self.home = Some(home.into());
    self
  }

  /// Resolve the configured credential chain.
  ///
  /// Order: region check, provider chain, optional role exchange, optional
  /// identity check, account allow/deny lists. Nothing is retried.
  #[instrument(name = "resolve_credentials", skip(self, config), fields(app = %config.app_name))]
  pub async fn resolve(&self, config: &ProviderConfig) -> Result<Identity, CredentialError> {
    let region = self.region(config)?;
    if !config.skip_region_validation {
      validate_region(&region)?;
    }

    if !config.allowed_account_ids.is_empty() && !config.forbidden_account_ids.is_empty() {
      return Err(CredentialError::configuration(
        "allowed_account_ids and forbidden_account_ids are mutually exclusive",
      ));
    }

    let (mut credentials, mut source) = self.chain(config).provide()?;
    info!(provider = source.name(), "credential provider selected");

    let timeout = config.call_timeout();
    if let Some(role) = config.assume_role.as_ref().filter(|r| !r.role_arn.is_empty()) {
      let assumed = self
        .assume_role(role, &credentials, &region, timeout)
        .await?;
      source = CredentialSource::AssumedRole {
        base: Box::new(source),
        role_arn: role.role_arn.clone(),
        external_id: role.external_id.clone(),
        session_name: session_name(role),
        duration_seconds: role.duration_seconds,
        policy_arns: role.policy_arns.clone(),
        session_tags: role.tags.clone(),
        transitive_tag_keys: role.transitive_tag_keys.clone(),
      };
      credentials = assumed;
      info!(role_arn = %role.role_arn, "assumed role");
    }

    let (account_id, partition) = if config.skip_credentials_validation {
      (
        account_from_role(config).unwrap_or_default(),
        partition_for_region(&region).to_string(),
      )
    } else {
      let client = self.connector.connect(&credentials, &region);
      let caller = with_timeout(timeout, client.get_caller_identity())
        .await
        .map_err(|e| {
          CredentialError::authentication("error validating provider credentials", e)
        })?;
      let partition = if caller.partition.is_empty() {
        partition_for_region(&region).to_string()
      } else {
        caller.partition
      };
      (caller.account_id, partition)
    };

    check_account(config, &account_id)?;

    info!(
      account_id = %account_id,
      partition = %partition,
      region = %region,
      provider = source.name(),
      "credentials resolved"
    );

    Ok(Identity {
      credentials,
      account_id,
      partition,
      region,
      source,
    })
  }

  fn region(&self, config: &ProviderConfig) -> Result<String, CredentialError> {
    if !config.region.is_empty() {
      return Ok(config.region.clone());
    }

    (self.env)("AWS_REGION")
      .or_else(|| (self.env)("AWS_DEFAULT_REGION"))
      .ok_or_else(|| CredentialError::configuration("region is required"))
  }

  fn chain(&self, config: &ProviderConfig) -> CredentialChain {
    let profile = config
      .profile
      .clone()
      .filter(|p| !p.is_empty())
      .or_else(|| (self.env)("AWS_PROFILE"))
      .unwrap_or_else(|| "default".to_string());
    let file = expand_home(&config.shared_credentials_file, self.home.as_deref());

    CredentialChain::new(vec![
      Box::new(StaticProvider::new(config)),
      Box::new(EnvironmentProvider::new(self.env.clone())),
      Box::new(SharedProfileProvider::new(file, profile)),
    ])
  }

  async fn assume_role(
    &self,
    role: &AssumeRoleConfig,
    base: &Credentials,
    region: &str,
    timeout: Duration,
  ) -> Result<Credentials, CredentialError> {
    if let Some(duration) = role.duration_seconds
      && !(MIN_ROLE_DURATION_SECS..=MAX_ROLE_DURATION_SECS).contains(&duration)
    {
      return Err(CredentialError::configuration(format!(
        "assume_role duration_seconds must be between {MIN_ROLE_DURATION_SECS} and \
         {MAX_ROLE_DURATION_SECS}, got {duration}"
      )));
    }

    let request = AssumeRoleRequest {
      role_arn: role.role_arn.clone(),
      session_name: session_name(role),
      external_id: role.external_id.clone(),
      duration_seconds: role.duration_seconds,
      policy: role.policy.clone(),
      policy_arns: role.policy_arns.clone(),
      tags: role.tags.clone(),
      transitive_tag_keys: role.transitive_tag_keys.clone(),
    };

    let client = self.connector.connect(base, region);
    with_timeout(timeout, client.assume_role(&request))
      .await
      .map_err(|e| {
        CredentialError::authentication(format!("failed to assume role {}", role.role_arn), e)
      })
  }
}

fn session_name(role: &AssumeRoleConfig) -> String {
  role
    .session_name
    .clone()
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string())
}

fn account_from_role(config: &ProviderConfig) -> Option<String> {
  let role = config.assume_role.as_ref()?;
  let arn: Arn = role.role_arn.parse().ok()?;
  Some(arn.account_id)
}

fn check_account(config: &ProviderConfig, account_id: &str) -> Result<(), CredentialError> {
  if account_id.is_empty() {
    return Ok(());
  }

  if config.forbidden_account_ids.iter().any(|a| a == account_id) {
    return Err(CredentialError::configuration(format!(
      "account {account_id} is forbidden"
    )));
  }

  if !config.allowed_account_ids.is_empty()
    && !config.allowed_account_ids.iter().any(|a| a == account_id)
  {
    return Err(CredentialError::configuration(format!(
      "account {account_id} is not in allowed_account_ids"
    )));
  }

  Ok(())
}
