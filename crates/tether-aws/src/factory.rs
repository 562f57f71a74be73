use std::collections::HashMap;
use std::sync::Arc;

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use tether_capability::{Capabilities, Credentials};
use tether_config::ProviderConfig;
use tether_credentials::Identity;

use crate::datastore::{DynamoTableClient, S3ObjectStoreClient};
use crate::events::EventBridgeScheduler;
use crate::function::LambdaFunctionClient;
use crate::gateway::ApiGatewayRouteClient;
use crate::messaging::{SnsTopicClient, SqsQueueClient};
use crate::registry::DynamoRegistry;

/// Builds one SDK client per service for a resolved identity.
///
/// Nothing is connected until a capability is first used, so building the
/// whole bundle is cheap.
#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
  endpoints: HashMap<String, String>,
}

macro_rules! service_client {
  ($factory:expr, $sdk:expr, $krate:ident, $service:literal) => {{
    let mut builder = $krate::config::Builder::from($sdk);
    if let Some(url) = $factory.endpoint($service) {
      builder = builder.endpoint_url(url);
    }
    $krate::Client::from_conf(builder.build())
  }};
}

impl ClientFactory {
  pub fn new(config: &ProviderConfig) -> Self {
    Self {
      endpoints: config.endpoints.clone(),
    }
  }

  pub fn with_endpoints(endpoints: HashMap<String, String>) -> Self {
    Self { endpoints }
  }

  /// Endpoint override for `service`, ignoring empty entries.
  pub fn endpoint(&self, service: &str) -> Option<&str> {
    self
      .endpoints
      .get(service)
      .map(String::as_str)
      .filter(|url| !url.is_empty())
  }

  /// Shared SDK configuration carrying `credentials` in `region`.
  pub fn sdk_config(&self, credentials: &Credentials, region: &str) -> SdkConfig {
    let provider = aws_credential_types::Credentials::new(
      credentials.access_key_id.clone(),
      credentials.secret_access_key.clone(),
      credentials.session_token.clone(),
      None,
      "tether",
    );

    SdkConfig::builder()
      .behavior_version(BehaviorVersion::latest())
      .region(Region::new(region.to_string()))
      .credentials_provider(SharedCredentialsProvider::new(provider))
      .retry_config(RetryConfig::disabled())
      .build()
  }

  pub fn capabilities(&self, identity: &Identity) -> Capabilities {
    let sdk = self.sdk_config(&identity.credentials, &identity.region);

    let s3 = {
      let mut builder = aws_sdk_s3::config::Builder::from(&sdk);
      if let Some(url) = self.endpoint("s3") {
        builder = builder.endpoint_url(url).force_path_style(true);
      }
      aws_sdk_s3::Client::from_conf(builder.build())
    };

    Capabilities {
      function: Arc::new(LambdaFunctionClient::new(service_client!(
        self,
        &sdk,
        aws_sdk_lambda,
        "lambda"
      ))),
      scheduler: Arc::new(EventBridgeScheduler::new(service_client!(
        self,
        &sdk,
        aws_sdk_eventbridge,
        "events"
      ))),
      route: Arc::new(ApiGatewayRouteClient::new(service_client!(
        self,
        &sdk,
        aws_sdk_apigateway,
        "apigateway"
      ))),
      topic: Arc::new(SnsTopicClient::new(service_client!(
        self,
        &sdk,
        aws_sdk_sns,
        "sns"
      ))),
      queue: Arc::new(SqsQueueClient::new(service_client!(
        self,
        &sdk,
        aws_sdk_sqs,
        "sqs"
      ))),
      table: Arc::new(DynamoTableClient::new(service_client!(
        self,
        &sdk,
        aws_sdk_dynamodb,
        "dynamodb"
      ))),
      object_store: Arc::new(S3ObjectStoreClient::new(s3)),
    }
  }

  /// Registry backed by a DynamoDB table per application.
  pub fn registry(&self, identity: &Identity) -> DynamoRegistry {
    let sdk = self.sdk_config(&identity.credentials, &identity.region);
    DynamoRegistry::new(service_client!(self, &sdk, aws_sdk_dynamodb, "dynamodb"))
  }

  pub(crate) fn sts(&self, credentials: &Credentials, region: &str) -> aws_sdk_sts::Client {
    let sdk = self.sdk_config(credentials, region);
    service_client!(self, &sdk, aws_sdk_sts, "sts")
  }
}
