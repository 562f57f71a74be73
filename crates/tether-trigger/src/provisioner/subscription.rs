use std::sync::Arc;

use async_trait::async_trait;
use tether_capability::{FunctionClient, Principal, Protocol, QueueClient, TopicClient};
use tether_config::{SubscriptionTrigger, TriggerKind, TriggerSpec};

use super::{Provisioner, mismatched};
use crate::binding::{CreatedId, Role, TriggerBinding};
use crate::context::StepContext;
use crate::error::{Step, TriggerError};

/// Topic subscription, either straight to the function or through a queue.
///
/// Buffered: queue -> queue subscription -> queue-to-function mapping.
/// Direct: invoke permission -> function subscription.
pub struct SubscriptionProvisioner {
  topic: Arc<dyn TopicClient>,
  queue: Arc<dyn QueueClient>,
  function: Arc<dyn FunctionClient>,
}

impl SubscriptionProvisioner {
  pub fn new(
    topic: Arc<dyn TopicClient>,
    queue: Arc<dyn QueueClient>,
    function: Arc<dyn FunctionClient>,
  ) -> Self {
    Self {
      topic,
      queue,
      function,
    }
  }

  fn queue_name(ctx: &StepContext<'_>) -> String {
    format!("{}-buffer", ctx.deployment.name)
  }

  async fn provision_buffered(
    &self,
    ctx: &StepContext<'_>,
    spec: &SubscriptionTrigger,
    binding: &mut TriggerBinding,
  ) -> Result<(), TriggerError> {
    let queue_url = match binding.created(Role::Queue) {
      Some(url) => url.to_string(),
      None => {
        let url = ctx
          .provision(
            Step::CreateQueue,
            self.queue.create_queue(&Self::queue_name(ctx)),
          )
          .await?;
        binding.record(Role::Queue, &url);
        url
      }
    };

    let queue_arn = ctx
      .provision(Step::ReadQueueAttributes, self.queue.queue_arn(&queue_url))
      .await?;

    if binding.created(Role::Subscription).is_none() {
      let subscription = ctx
        .provision(
          Step::Subscribe,
          self
            .topic
            .subscribe(&spec.topic_id, Protocol::Sqs, &queue_arn),
        )
        .await?;
      binding.record(Role::Subscription, subscription);
    }

    if binding.created(Role::Mapping).is_none() {
      let mapping = ctx.map_source(self.function.as_ref(), &queue_arn).await?;
      binding.record(Role::Mapping, mapping);
    }

    Ok(())
  }

  async fn provision_direct(
    &self,
    ctx: &StepContext<'_>,
    spec: &SubscriptionTrigger,
    binding: &mut TriggerBinding,
  ) -> Result<(), TriggerError> {
    if binding.created(Role::Permission).is_none() {
      let statement_id = ctx
        .grant(self.function.as_ref(), Principal::Topic, &spec.topic_id)
        .await?;
      binding.record(Role::Permission, statement_id);
    }

    if binding.created(Role::Subscription).is_none() {
      let subscription = ctx
        .provision(
          Step::Subscribe,
          self
            .topic
            .subscribe(&spec.topic_id, Protocol::Lambda, &ctx.deployment.id),
        )
        .await?;
      binding.record(Role::Subscription, subscription);
    }

    Ok(())
  }
}

#[async_trait]
impl Provisioner for SubscriptionProvisioner {
  fn kind(&self) -> TriggerKind {
    TriggerKind::Subscription
  }

  async fn provision(
    &self,
    ctx: &StepContext<'_>,
    binding: &mut TriggerBinding,
  ) -> Result<(), TriggerError> {
    let TriggerSpec::Subscription(spec) = binding.spec.clone() else {
      return Err(mismatched(self.kind(), binding));
    };

    if spec.buffered {
      self.provision_buffered(ctx, &spec, binding).await
    } else {
      self.provision_direct(ctx, &spec, binding).await
    }
  }

  async fn release(
    &self,
    ctx: &StepContext<'_>,
    _binding: &TriggerBinding,
    created: &CreatedId,
  ) -> Result<(), TriggerError> {
    match created.role {
      Role::Mapping => {
        ctx
          .teardown(
            Step::DeleteMapping,
            self.function.delete_event_source_mapping(&created.id),
          )
          .await
      }
      Role::Subscription => {
        ctx
          .teardown(Step::Unsubscribe, self.topic.unsubscribe(&created.id))
          .await
      }
      Role::Queue => {
        ctx
          .teardown(Step::DeleteQueue, self.queue.delete_queue(&created.id))
          .await
      }
      Role::Permission => ctx.revoke(self.function.as_ref(), &created.id).await,
      _ => Ok(()),
    }
  }
}
