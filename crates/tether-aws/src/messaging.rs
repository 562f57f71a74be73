use async_trait::async_trait;
use aws_sdk_sqs::types::QueueAttributeName;
use serde_json::json;
use tether_capability::{CapabilityError, Protocol, QueueClient, TopicClient};

use crate::error::{missing, sdk_error};

/// SNS-backed [`TopicClient`].
#[derive(Debug, Clone)]
pub struct SnsTopicClient {
  client: aws_sdk_sns::Client,
}

impl SnsTopicClient {
  pub fn new(client: aws_sdk_sns::Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl TopicClient for SnsTopicClient {
  async fn subscribe(
    &self,
    topic_arn: &str,
    protocol: Protocol,
    endpoint: &str,
  ) -> Result<String, CapabilityError> {
    let out = self
      .client
      .subscribe()
      .topic_arn(topic_arn)
      .protocol(protocol.as_str())
      .endpoint(endpoint)
      .return_subscription_arn(true)
      .send()
      .await
      .map_err(|e| sdk_error("sns", e))?;

    out
      .subscription_arn()
      .map(str::to_string)
      .ok_or_else(|| missing("sns", "subscription ARN"))
  }

  async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), CapabilityError> {
    self
      .client
      .unsubscribe()
      .subscription_arn(subscription_arn)
      .send()
      .await
      .map_err(|e| sdk_error("sns", e))?;
    Ok(())
  }
}

/// SQS-backed [`QueueClient`].
///
/// Created queues carry a policy letting the topic service deliver to them.
#[derive(Debug, Clone)]
pub struct SqsQueueClient {
  client: aws_sdk_sqs::Client,
}

impl SqsQueueClient {
  pub fn new(client: aws_sdk_sqs::Client) -> Self {
    Self { client }
  }
}

/// Queue policy allowing the topic service to send to `queue_arn`.
pub(crate) fn delivery_policy(queue_arn: &str) -> String {
  json!({
    "Version": "2012-10-17",
    "Statement": [{
      "Sid": "tether-topic-delivery",
      "Effect": "Allow",
      "Principal": {"Service": "sns.amazonaws.com"},
      "Action": "sqs:SendMessage",
      "Resource": queue_arn,
    }]
  })
  .to_string()
}

#[async_trait]
impl QueueClient for SqsQueueClient {
  async fn create_queue(&self, name: &str) -> Result<String, CapabilityError> {
    let out = self
      .client
      .create_queue()
      .queue_name(name)
      .send()
      .await
      .map_err(|e| sdk_error("sqs", e))?;
    let url = out
      .queue_url()
      .ok_or_else(|| missing("sqs", "queue URL"))?
      .to_string();

    let arn = self.queue_arn(&url).await?;
    self
      .client
      .set_queue_attributes()
      .queue_url(&url)
      .attributes(QueueAttributeName::Policy, delivery_policy(&arn))
      .send()
      .await
      .map_err(|e| sdk_error("sqs", e))?;

    Ok(url)
  }

  async fn queue_arn(&self, queue_url: &str) -> Result<String, CapabilityError> {
    let out = self
      .client
      .get_queue_attributes()
      .queue_url(queue_url)
      .attribute_names(QueueAttributeName::QueueArn)
      .send()
      .await
      .map_err(|e| sdk_error("sqs", e))?;

    out
      .attributes()
      .and_then(|attributes| attributes.get(&QueueAttributeName::QueueArn))
      .cloned()
      .ok_or_else(|| missing("sqs", "QueueArn attribute"))
  }

  async fn delete_queue(&self, queue_url: &str) -> Result<(), CapabilityError> {
    self
      .client
      .delete_queue()
      .queue_url(queue_url)
      .send()
      .await
      .map_err(|e| sdk_error("sqs", e))?;
    Ok(())
  }
}
