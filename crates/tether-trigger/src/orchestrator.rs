use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tether_capability::Capabilities;
use tether_config::TriggerKind;
use tracing::{error, info, instrument, warn};

use crate::binding::{BindingState, TriggerBinding};
use crate::context::StepContext;
use crate::deployment::FunctionDeployment;
use crate::error::TriggerError;
use crate::locks::DeploymentLocks;
use crate::provisioner::{
  DatastoreProvisioner, Provisioner, RouteProvisioner, ScheduleProvisioner,
  SubscriptionProvisioner,
};

/// Drives trigger bindings through their provisioning and teardown
/// sequences.
///
/// Bindings of different kinds on one deployment may be bound concurrently.
/// Unbinding waits for in-flight binds on the same deployment to finish.
pub struct TriggerOrchestrator {
  provisioners: BTreeMap<TriggerKind, Arc<dyn Provisioner>>,
  locks: DeploymentLocks,
  call_timeout: Duration,
}

impl TriggerOrchestrator {
  /// Build the four standard provisioners over `capabilities`.
  pub fn new(
    capabilities: &Capabilities,
    execution_role: impl Into<String>,
    call_timeout: Duration,
  ) -> Self {
    let provisioners: Vec<Arc<dyn Provisioner>> = vec![
      Arc::new(ScheduleProvisioner::new(
        capabilities.scheduler.clone(),
        capabilities.function.clone(),
      )),
      Arc::new(RouteProvisioner::new(
        capabilities.route.clone(),
        capabilities.function.clone(),
        execution_role,
      )),
      Arc::new(SubscriptionProvisioner::new(
        capabilities.topic.clone(),
        capabilities.queue.clone(),
        capabilities.function.clone(),
      )),
      Arc::new(DatastoreProvisioner::new(
        capabilities.table.clone(),
        capabilities.object_store.clone(),
        capabilities.function.clone(),
      )),
    ];

    Self::with_provisioners(provisioners, call_timeout)
  }

  pub fn with_provisioners(
    provisioners: impl IntoIterator<Item = Arc<dyn Provisioner>>,
    call_timeout: Duration,
  ) -> Self {
    Self {
      provisioners: provisioners.into_iter().map(|p| (p.kind(), p)).collect(),
      locks: DeploymentLocks::new(),
      call_timeout,
    }
  }

  pub fn locks(&self) -> &DeploymentLocks {
    &self.locks
  }

  fn provisioner(
    &self,
    binding: &TriggerBinding,
    action: &'static str,
  ) -> Result<Arc<dyn Provisioner>, TriggerError> {
    self
      .provisioners
      .get(&binding.kind)
      .cloned()
      .ok_or(TriggerError::InvalidState {
        kind: binding.kind,
        state: binding.state,
        action,
      })
  }

  /// Bind (or resume binding) a trigger to `deployment`.
  ///
  /// An `Active` binding is left untouched. On failure the binding moves
  /// to `Error` and keeps every identifier created before the failing step.
  #[instrument(
    name = "trigger_bind",
    skip(self, deployment, binding),
    fields(deployment = %deployment.name, kind = %binding.kind)
  )]
  pub async fn bind(
    &self,
    deployment: &FunctionDeployment,
    binding: &mut TriggerBinding,
  ) -> Result<(), TriggerError> {
    match binding.state {
      BindingState::Active => return Ok(()),
      BindingState::Absent | BindingState::Error => {}
      state @ (BindingState::Provisioning | BindingState::Deprovisioning) => {
        return Err(TriggerError::InvalidState {
          kind: binding.kind,
          state,
          action: "bind",
        });
      }
    }

    let provisioner = self.provisioner(binding, "bind")?;
    let lock = self.locks.get(&deployment.id);
    let _lifecycle = lock.lifecycle.read().await;

    binding.transition(BindingState::Provisioning);
    info!(
      deployment = %deployment.name,
      kind = %binding.kind,
      recorded = binding.created_ids.len(),
      "binding_started"
    );

    let ctx = StepContext::new(deployment, binding.kind, self.call_timeout, &lock);
    match provisioner.provision(&ctx, binding).await {
      Ok(()) => {
        binding.transition(BindingState::Active);
        info!(
          deployment = %deployment.name,
          kind = %binding.kind,
          created = binding.created_ids.len(),
          "binding_active"
        );
        Ok(())
      }
      Err(e) => {
        binding.fail(&e);
        error!(
          deployment = %deployment.name,
          kind = %binding.kind,
          error = %e,
          "binding_failed"
        );
        if !binding.created_ids.is_empty() {
          warn!(
            deployment = %deployment.name,
            kind = %binding.kind,
            orphans = ?binding.created_ids,
            "binding_left_orphans"
          );
        }
        Err(e)
      }
    }
  }

  /// Release every recorded identifier of `binding`, newest first.
  ///
  /// Each identifier is dropped from the binding once released, so a
  /// failed teardown leaves exactly the still-pending identifiers behind.
  #[instrument(
    name = "trigger_unbind",
    skip(self, deployment, binding),
    fields(deployment = %deployment.name, kind = %binding.kind)
  )]
  pub async fn unbind(
    &self,
    deployment: &FunctionDeployment,
    binding: &mut TriggerBinding,
  ) -> Result<(), TriggerError> {
    match binding.state {
      BindingState::Absent => return Ok(()),
      BindingState::Active | BindingState::Error => {}
      state @ (BindingState::Provisioning | BindingState::Deprovisioning) => {
        return Err(TriggerError::InvalidState {
          kind: binding.kind,
          state,
          action: "unbind",
        });
      }
    }

    let provisioner = self.provisioner(binding, "unbind")?;
    let lock = self.locks.get(&deployment.id);
    let _lifecycle = lock.lifecycle.write().await;

    binding.transition(BindingState::Deprovisioning);
    info!(
      deployment = %deployment.name,
      kind = %binding.kind,
      pending = binding.created_ids.len(),
      "unbinding_started"
    );

    let ctx = StepContext::new(deployment, binding.kind, self.call_timeout, &lock);
    while let Some(created) = binding.created_ids.last().cloned() {
      if let Err(e) = provisioner.release(&ctx, binding, &created).await {
        binding.fail(&e);
        error!(
          deployment = %deployment.name,
          kind = %binding.kind,
          role = %created.role,
          error = %e,
          "unbinding_failed"
        );
        return Err(e);
      }
      binding.created_ids.pop();
      info!(role = %created.role, id = %created.id, "released");
    }

    binding.transition(BindingState::Absent);
    info!(
      deployment = %deployment.name,
      kind = %binding.kind,
      "unbinding_completed"
    );
    Ok(())
  }
}
