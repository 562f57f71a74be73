use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tether_config::HttpMethod;

use crate::error::CapabilityError;

/// Timer rules and their targets.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
  /// Create or overwrite the rule `name`. Returns the rule's ARN.
  async fn put_rule(&self, name: &str, expression: &str) -> Result<String, CapabilityError>;

  async fn put_target(
    &self,
    rule: &str,
    target_id: &str,
    target_arn: &str,
  ) -> Result<(), CapabilityError>;

  async fn remove_targets(&self, rule: &str, target_ids: &[String])
  -> Result<(), CapabilityError>;

  /// Rejected with [`CapabilityError::Conflict`] while the rule has targets.
  async fn delete_rule(&self, name: &str) -> Result<(), CapabilityError>;
}

/// A resource (path) of an HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResource {
  pub id: String,
  pub path: String,
}

/// Method integration pointing a route at a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationRequest {
  pub api_id: String,
  pub resource_id: String,
  pub method: HttpMethod,
  /// The function's invoke URI.
  pub uri: String,
  /// Role the gateway assumes to call the function.
  pub role_arn: String,
  pub content_type: String,
}

/// HTTP API routing.
#[async_trait]
pub trait RouteClient: Send + Sync {
  async fn list_resources(&self, api_id: &str) -> Result<Vec<ApiResource>, CapabilityError>;

  /// Create or overwrite the integration for the request's method.
  async fn put_integration(&self, request: &IntegrationRequest) -> Result<(), CapabilityError>;

  async fn delete_integration(
    &self,
    api_id: &str,
    resource_id: &str,
    method: HttpMethod,
  ) -> Result<(), CapabilityError>;
}

/// Delivery protocol of a topic subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
  Lambda,
  Sqs,
}

impl Protocol {
  pub fn as_str(&self) -> &'static str {
    match self {
      Protocol::Lambda => "lambda",
      Protocol::Sqs => "sqs",
    }
  }
}

/// Publish/subscribe topics.
#[async_trait]
pub trait TopicClient: Send + Sync {
  /// Subscribe `endpoint` to `topic_arn`. Returns the subscription ARN.
  async fn subscribe(
    &self,
    topic_arn: &str,
    protocol: Protocol,
    endpoint: &str,
  ) -> Result<String, CapabilityError>;

  async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), CapabilityError>;
}

/// Durable queues.
#[async_trait]
pub trait QueueClient: Send + Sync {
  /// Create the queue `name`, or return the existing queue's URL.
  async fn create_queue(&self, name: &str) -> Result<String, CapabilityError>;

  /// Read the queue's ARN from its attributes.
  async fn queue_arn(&self, queue_url: &str) -> Result<String, CapabilityError>;

  async fn delete_queue(&self, queue_url: &str) -> Result<(), CapabilityError>;
}
