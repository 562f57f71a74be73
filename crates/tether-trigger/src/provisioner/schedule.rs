use std::sync::Arc;

use async_trait::async_trait;
use tether_capability::{Arn, FunctionClient, Principal, SchedulerClient};
use tether_config::{TriggerKind, TriggerSpec};

use super::{Provisioner, mismatched};
use crate::binding::{CreatedId, Role, TriggerBinding};
use crate::context::StepContext;
use crate::error::{Step, TriggerError};

/// Timer rule -> invoke permission -> rule target.
pub struct ScheduleProvisioner {
  scheduler: Arc<dyn SchedulerClient>,
  function: Arc<dyn FunctionClient>,
}

impl ScheduleProvisioner {
  pub fn new(scheduler: Arc<dyn SchedulerClient>, function: Arc<dyn FunctionClient>) -> Self {
    Self {
      scheduler,
      function,
    }
  }

  fn rule_name(ctx: &StepContext<'_>) -> String {
    format!("{}-schedule", ctx.deployment.name)
  }

  fn target_id(ctx: &StepContext<'_>) -> String {
    format!("{}-target", ctx.deployment.name)
  }
}

/// Rule name from a recorded rule ARN (`...:rule/<name>`).
fn rule_from_arn(arn: &str) -> String {
  arn
    .parse::<Arn>()
    .map(|arn| arn.resource_name().to_string())
    .unwrap_or_else(|_| arn.to_string())
}

#[async_trait]
impl Provisioner for ScheduleProvisioner {
  fn kind(&self) -> TriggerKind {
    TriggerKind::Schedule
  }

  async fn provision(
    &self,
    ctx: &StepContext<'_>,
    binding: &mut TriggerBinding,
  ) -> Result<(), TriggerError> {
    let TriggerSpec::Schedule(spec) = binding.spec.clone() else {
      return Err(mismatched(self.kind(), binding));
    };

    let rule_arn = match binding.created(Role::Rule) {
      Some(arn) => arn.to_string(),
      None => {
        let arn = ctx
          .provision(
            Step::CreateRule,
            self.scheduler.put_rule(&Self::rule_name(ctx), &spec.expression),
          )
          .await?;
        binding.record(Role::Rule, &arn);
        arn
      }
    };

    if binding.created(Role::Permission).is_none() {
      let statement_id = ctx
        .grant(self.function.as_ref(), Principal::Scheduler, &rule_arn)
        .await?;
      binding.record(Role::Permission, statement_id);
    }

    if binding.created(Role::Target).is_none() {
      let target_id = Self::target_id(ctx);
      ctx
        .provision(
          Step::AttachTarget,
          self
            .scheduler
            .put_target(&rule_from_arn(&rule_arn), &target_id, &ctx.deployment.id),
        )
        .await?;
      binding.record(Role::Target, target_id);
    }

    Ok(())
  }

  async fn release(
    &self,
    ctx: &StepContext<'_>,
    binding: &TriggerBinding,
    created: &CreatedId,
  ) -> Result<(), TriggerError> {
    let rule = binding
      .created(Role::Rule)
      .map(rule_from_arn)
      .unwrap_or_else(|| Self::rule_name(ctx));

    match created.role {
      Role::Target => {
        ctx
          .teardown(
            Step::RemoveTarget,
            self
              .scheduler
              .remove_targets(&rule, std::slice::from_ref(&created.id)),
          )
          .await
      }
      Role::Permission => ctx.revoke(self.function.as_ref(), &created.id).await,
      Role::Rule => {
        ctx
          .teardown(Step::DeleteRule, self.scheduler.delete_rule(&rule))
          .await
      }
      _ => Ok(()),
    }
  }
}
