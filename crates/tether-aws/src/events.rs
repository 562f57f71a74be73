use async_trait::async_trait;
use aws_sdk_eventbridge::Client;
use aws_sdk_eventbridge::types::{RuleState, Target};
use tether_capability::{CapabilityError, SchedulerClient};

use crate::error::{missing, sdk_error};

const SERVICE: &str = "events";

/// EventBridge-backed [`SchedulerClient`].
#[derive(Debug, Clone)]
pub struct EventBridgeScheduler {
  client: Client,
}

impl EventBridgeScheduler {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl SchedulerClient for EventBridgeScheduler {
  async fn put_rule(&self, name: &str, expression: &str) -> Result<String, CapabilityError> {
    let out = self
      .client
      .put_rule()
      .name(name)
      .schedule_expression(expression)
      .state(RuleState::Enabled)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;

    out
      .rule_arn()
      .map(str::to_string)
      .ok_or_else(|| missing(SERVICE, "rule ARN"))
  }

  async fn put_target(
    &self,
    rule: &str,
    target_id: &str,
    target_arn: &str,
  ) -> Result<(), CapabilityError> {
    let target = Target::builder()
      .id(target_id)
      .arn(target_arn)
      .build()
      .map_err(|e| CapabilityError::invalid_request(e.to_string()))?;

    let out = self
      .client
      .put_targets()
      .rule(rule)
      .targets(target)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;

    // Partial failures come back in the body, not as an error status.
    match out.failed_entries().first() {
      Some(entry) => Err(CapabilityError::service(
        SERVICE,
        format!(
          "{}: {}",
          entry.error_code().unwrap_or("PutTargetsFailed"),
          entry.error_message().unwrap_or_default()
        ),
      )),
      None => Ok(()),
    }
  }

  async fn remove_targets(
    &self,
    rule: &str,
    target_ids: &[String],
  ) -> Result<(), CapabilityError> {
    let out = self
      .client
      .remove_targets()
      .rule(rule)
      .set_ids(Some(target_ids.to_vec()))
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;

    match out.failed_entries().first() {
      Some(entry) => Err(CapabilityError::service(
        SERVICE,
        format!(
          "{}: {}",
          entry.error_code().unwrap_or("RemoveTargetsFailed"),
          entry.error_message().unwrap_or_default()
        ),
      )),
      None => Ok(()),
    }
  }

  async fn delete_rule(&self, name: &str) -> Result<(), CapabilityError> {
    self
      .client
      .delete_rule()
      .name(name)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;
    Ok(())
  }
}
