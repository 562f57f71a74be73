use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_sts::Client;
use aws_sdk_sts::types::{PolicyDescriptorType, Tag};
use tether_capability::{
  Arn, AssumeRoleRequest, CallerIdentity, CapabilityError, Credentials, IdentityClient,
  IdentityConnector,
};

use crate::error::{missing, sdk_error};
use crate::factory::ClientFactory;

const SERVICE: &str = "sts";

/// STS-backed [`IdentityClient`].
#[derive(Debug, Clone)]
pub struct StsIdentityClient {
  client: Client,
}

impl StsIdentityClient {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

fn build_error(e: impl std::fmt::Display) -> CapabilityError {
  CapabilityError::invalid_request(e.to_string())
}

#[async_trait]
impl IdentityClient for StsIdentityClient {
  async fn get_caller_identity(&self) -> Result<CallerIdentity, CapabilityError> {
    let out = self
      .client
      .get_caller_identity()
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;

    let arn = out.arn().ok_or_else(|| missing(SERVICE, "caller ARN"))?;
    let partition = arn
      .parse::<Arn>()
      .map(|parsed| parsed.partition)
      .map_err(|e| CapabilityError::service(SERVICE, e.to_string()))?;

    Ok(CallerIdentity {
      account_id: out
        .account()
        .ok_or_else(|| missing(SERVICE, "account"))?
        .to_string(),
      arn: arn.to_string(),
      partition,
    })
  }

  async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<Credentials, CapabilityError> {
    let policy_arns = request
      .policy_arns
      .iter()
      .map(|arn| PolicyDescriptorType::builder().arn(arn).build())
      .collect::<Vec<_>>();
    let tags = request
      .tags
      .iter()
      .map(|(k, v)| Tag::builder().key(k).value(v).build().map_err(build_error))
      .collect::<Result<Vec<_>, _>>()?;

    let out = self
      .client
      .assume_role()
      .role_arn(&request.role_arn)
      .role_session_name(&request.session_name)
      .set_external_id(request.external_id.clone())
      .set_duration_seconds(
        request
          .duration_seconds
          .map(|secs| i32::try_from(secs).unwrap_or(i32::MAX)),
      )
      .set_policy(request.policy.clone())
      .set_policy_arns((!policy_arns.is_empty()).then_some(policy_arns))
      .set_tags((!tags.is_empty()).then_some(tags))
      .set_transitive_tag_keys(
        (!request.transitive_tag_keys.is_empty()).then(|| request.transitive_tag_keys.clone()),
      )
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;

    let credentials = out
      .credentials()
      .ok_or_else(|| missing(SERVICE, "assumed credentials"))?;
    Ok(Credentials::new(
      credentials.access_key_id(),
      credentials.secret_access_key(),
      Some(credentials.session_token().to_string()),
    ))
  }
}

/// Connects an [`StsIdentityClient`] for each credential set the resolver
/// tries.
#[derive(Debug, Clone, Default)]
pub struct StsConnector {
  factory: ClientFactory,
}

impl StsConnector {
  pub fn new(factory: ClientFactory) -> Self {
    Self { factory }
  }
}

impl IdentityConnector for StsConnector {
  fn connect(&self, credentials: &Credentials, region: &str) -> Arc<dyn IdentityClient> {
    Arc::new(StsIdentityClient::new(
      self.factory.sts(credentials, region),
    ))
  }
}
