use std::future::Future;
use std::time::Duration;

use tether_capability::{CapabilityError, FunctionClient, PermissionGrant, Principal, with_timeout};
use tether_config::TriggerKind;
use tracing::debug;

use crate::deployment::FunctionDeployment;
use crate::error::{Step, TriggerError};
use crate::locks::DeploymentLock;

/// What a provisioner sees while running steps for one binding.
pub struct StepContext<'a> {
  pub deployment: &'a FunctionDeployment,
  pub kind: TriggerKind,
  call_timeout: Duration,
  lock: &'a DeploymentLock,
}

impl<'a> StepContext<'a> {
  pub fn new(
    deployment: &'a FunctionDeployment,
    kind: TriggerKind,
    call_timeout: Duration,
    lock: &'a DeploymentLock,
  ) -> Self {
    Self {
      deployment,
      kind,
      call_timeout,
      lock,
    }
  }

  /// Run one provisioning call under the call timeout.
  pub async fn provision<T, F>(&self, step: Step, call: F) -> Result<T, TriggerError>
  where
    F: Future<Output = Result<T, CapabilityError>>,
  {
    with_timeout(self.call_timeout, call)
      .await
      .map_err(|source| TriggerError::ProvisioningStepFailed {
        kind: self.kind,
        step,
        source,
      })
  }

  /// Run one teardown call under the call timeout. An object the control
  /// plane no longer knows counts as released.
  pub async fn teardown<F>(&self, step: Step, call: F) -> Result<(), TriggerError>
  where
    F: Future<Output = Result<(), CapabilityError>>,
  {
    match with_timeout(self.call_timeout, call).await {
      Ok(()) => Ok(()),
      Err(source) if source.is_not_found() => {
        debug!(kind = %self.kind, step = %step, "already released");
        Ok(())
      }
      Err(source) => Err(TriggerError::TeardownStepFailed {
        kind: self.kind,
        step,
        source,
      }),
    }
  }

  /// Statement id of this binding's invoke permission.
  pub fn statement_id(&self) -> String {
    format!("tether-{}-{}", self.kind, self.deployment.name)
  }

  /// Grant `principal` permission to invoke the deployment from
  /// `source_arn`. Returns the statement id.
  pub async fn grant(
    &self,
    function: &dyn FunctionClient,
    principal: Principal,
    source_arn: &str,
  ) -> Result<String, TriggerError> {
    let statement_id = self.statement_id();
    let _policy = self.lock.permissions.lock().await;

    let exists = self
      .provision(
        Step::GrantPermission,
        function.has_permission(&self.deployment.id, &statement_id),
      )
      .await?;
    if !exists {
      let grant = PermissionGrant {
        function: self.deployment.id.clone(),
        statement_id: statement_id.clone(),
        principal,
        source_arn: source_arn.to_string(),
      };
      self
        .provision(Step::GrantPermission, function.add_permission(&grant))
        .await?;
    }

    Ok(statement_id)
  }

  pub async fn revoke(
    &self,
    function: &dyn FunctionClient,
    statement_id: &str,
  ) -> Result<(), TriggerError> {
    let _policy = self.lock.permissions.lock().await;
    self
      .teardown(
        Step::RevokePermission,
        function.remove_permission(&self.deployment.id, statement_id),
      )
      .await
  }

  /// Reuse an existing mapping from `source_arn` to the deployment, or
  /// create one.
  pub async fn map_source(
    &self,
    function: &dyn FunctionClient,
    source_arn: &str,
  ) -> Result<String, TriggerError> {
    let existing = self
      .provision(
        Step::CreateMapping,
        function.find_event_source_mapping(source_arn, &self.deployment.id),
      )
      .await?;
    if let Some(id) = existing {
      return Ok(id);
    }

    self
      .provision(
        Step::CreateMapping,
        function.create_event_source_mapping(source_arn, &self.deployment.id),
      )
      .await
  }
}
