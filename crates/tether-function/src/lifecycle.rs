use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tether_capability::{
  Arn, Capabilities, CreateFunctionRequest, FunctionClient, FunctionInfo, with_timeout,
};
use tether_config::{FunctionSpec, ProviderConfig, RuntimeDescriptor, TriggerKind, TriggerSpec};
use tether_credentials::Identity;
use tether_registry::{Registry, RegistryError, RegistryItem};
use tether_trigger::{BindingState, FunctionDeployment, TriggerBinding, TriggerOrchestrator};
use tracing::{error, info, instrument, warn};

use crate::error::LifecycleError;
use crate::report::{BindingReport, DeleteReport, DeploymentReport};

/// Everything the lifecycle needs to know about where it deploys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
  /// Keys the registry table.
  pub app_name: String,
  /// May be empty when credential validation was skipped.
  pub account_id: String,
  pub region: String,
  pub partition: String,
  pub execution_role_name: String,
  pub call_timeout: Duration,
}

impl LifecycleSettings {
  pub fn new(config: &ProviderConfig, identity: &Identity) -> Self {
    Self {
      app_name: config.app_name.clone(),
      account_id: identity.account_id.clone(),
      region: identity.region.clone(),
      partition: identity.partition.clone(),
      execution_role_name: config.execution_role_name.clone(),
      call_timeout: config.call_timeout(),
    }
  }
}

/// Creates, reads, updates and deletes function deployments and their
/// trigger bindings.
pub struct FunctionLifecycle {
  function: Arc<dyn FunctionClient>,
  orchestrator: TriggerOrchestrator,
  registry: Arc<dyn Registry>,
  settings: LifecycleSettings,
}

impl FunctionLifecycle {
  pub fn new(
    capabilities: &Capabilities,
    registry: Arc<dyn Registry>,
    settings: LifecycleSettings,
  ) -> Self {
    let orchestrator = TriggerOrchestrator::new(
      capabilities,
      settings.execution_role_name.clone(),
      settings.call_timeout,
    );
    Self::with_orchestrator(capabilities.function.clone(), orchestrator, registry, settings)
  }

  pub fn with_orchestrator(
    function: Arc<dyn FunctionClient>,
    orchestrator: TriggerOrchestrator,
    registry: Arc<dyn Registry>,
    settings: LifecycleSettings,
  ) -> Self {
    Self {
      function,
      orchestrator,
      registry,
      settings,
    }
  }

  pub fn orchestrator(&self) -> &TriggerOrchestrator {
    &self.orchestrator
  }

  pub fn settings(&self) -> &LifecycleSettings {
    &self.settings
  }

  /// Create the function, then bind every declared trigger concurrently.
  ///
  /// Only a failure to create the function itself is an error. Binding
  /// failures are reported per binding and leave the deployment in place.
  #[instrument(name = "function_create", skip(self, spec), fields(function = %spec.name))]
  pub async fn create(&self, spec: &FunctionSpec) -> Result<DeploymentReport, LifecycleError> {
    let request = self.request(spec)?;
    let info = with_timeout(
      self.settings.call_timeout,
      self.function.create_function(&request),
    )
    .await
    .map_err(|source| LifecycleError::Function {
      action: "create",
      function: spec.name.clone(),
      source,
    })?;

    let deployment = self.deployment(&info).with_code(spec.code.clone());
    info!(function = %deployment.name, id = %deployment.id, "function_created");

    let mut bindings: Vec<TriggerBinding> = spec
      .triggers
      .specs()
      .into_iter()
      .map(TriggerBinding::new)
      .collect();
    let results = join_all(
      bindings
        .iter_mut()
        .map(|binding| self.orchestrator.bind(&deployment, binding)),
    )
    .await;

    let reports: Vec<BindingReport> = bindings
      .into_iter()
      .zip(results)
      .map(|(binding, result)| BindingReport::new(binding, result))
      .collect();

    Ok(self.finish(deployment, reports).await)
  }

  /// Current control-plane view of the deployment `id`.
  ///
  /// The code reference is not known to the control plane and is left unset.
  #[instrument(name = "function_read", skip(self))]
  pub async fn read(&self, id: &str) -> Result<FunctionDeployment, LifecycleError> {
    let info = with_timeout(self.settings.call_timeout, self.function.get_function(id))
      .await
      .map_err(|source| {
        if source.is_not_found() {
          LifecycleError::NotFound { id: id.to_string() }
        } else {
          LifecycleError::Function {
            action: "read",
            function: id.to_string(),
            source,
          }
        }
      })?;

    Ok(self.deployment(&info))
  }

  /// Bindings recorded for `id`. A deployment with no registry item has none.
  pub async fn bindings(&self, id: &str) -> Result<Vec<TriggerBinding>, LifecycleError> {
    let item = match self.registry.get(&self.settings.app_name, id).await {
      Ok(item) => item,
      Err(RegistryError::NotFound { .. }) => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    item
      .triggers
      .into_iter()
      .map(|value| serde_json::from_value(value).map_err(LifecycleError::from))
      .collect()
  }

  /// Replace the function's code and configuration, then reconcile its
  /// triggers kind by kind.
  ///
  /// Unchanged triggers are left alone (or resumed if a previous bind
  /// failed). Removed or changed triggers are unbound first; a changed
  /// trigger is rebound only once its old binding is fully released.
  #[instrument(name = "function_update", skip(self, spec), fields(function = %spec.name))]
  pub async fn update(
    &self,
    id: &str,
    spec: &FunctionSpec,
  ) -> Result<DeploymentReport, LifecycleError> {
    let mut deployment = self.read(id).await?;
    if deployment.name != spec.name {
      return Err(LifecycleError::InvalidSpec {
        message: format!(
          "function name cannot change from '{}' to '{}'",
          deployment.name, spec.name
        ),
      });
    }

    let request = self.request(spec)?;
    let info = with_timeout(
      self.settings.call_timeout,
      self.function.update_function(&deployment.id, &request),
    )
    .await
    .map_err(|source| LifecycleError::Function {
      action: "update",
      function: deployment.id.clone(),
      source,
    })?;
    deployment.refresh(&info);
    let deployment = deployment.with_code(spec.code.clone());
    info!(function = %deployment.name, id = %deployment.id, "function_updated");

    let mut recorded: BTreeMap<TriggerKind, TriggerBinding> = self
      .bindings(&deployment.id)
      .await?
      .into_iter()
      .map(|binding| (binding.kind, binding))
      .collect();

    let plans = TriggerKind::ALL.into_iter().filter_map(|kind| {
      let current = recorded.remove(&kind);
      let desired = spec.triggers.get(kind);
      if current.is_none() && desired.is_none() {
        return None;
      }
      Some(self.reconcile(&deployment, current, desired))
    });
    let reports: Vec<BindingReport> = join_all(plans).await.into_iter().flatten().collect();

    Ok(self.finish(deployment, reports).await)
  }

  /// Unbind every recorded trigger, then delete the function and its
  /// registry item.
  ///
  /// Deletion is refused while a binding is mid-transition, and while a
  /// binding failed teardown unless `force` is set. A refused deletion
  /// persists the bindings still awaiting teardown. A forced deletion
  /// removes the function but keeps the failed bindings in the registry.
  #[instrument(name = "function_delete", skip(self))]
  pub async fn delete(&self, id: &str, force: bool) -> Result<DeleteReport, LifecycleError> {
    let deployment = match self.read(id).await {
      Ok(deployment) => deployment,
      Err(LifecycleError::NotFound { .. }) => self.detached(id)?,
      Err(e) => return Err(e),
    };
    let id = deployment.id.as_str();

    let mut bindings = self.bindings(id).await?;
    let results = join_all(
      bindings
        .iter_mut()
        .map(|binding| self.orchestrator.unbind(&deployment, binding)),
    )
    .await;
    let reports: Vec<BindingReport> = bindings
      .into_iter()
      .zip(results)
      .map(|(binding, result)| BindingReport::new(binding, result))
      .collect();

    let in_transition = reports
      .iter()
      .any(|r| !matches!(r.binding.state, BindingState::Absent | BindingState::Error));
    let failed = reports
      .iter()
      .any(|r| r.binding.state == BindingState::Error);

    if in_transition || (failed && !force) {
      let pending: Vec<TriggerBinding> = reports
        .iter()
        .filter(|r| !r.binding.is_released())
        .map(|r| r.binding.clone())
        .collect();
      self.persist(id, &pending).await?;
      warn!(id = %id, pending = pending.len(), "deletion_refused");
      return Err(LifecycleError::DeletionRefused {
        id: id.to_string(),
        pending,
      });
    }

    let report = DeleteReport {
      id: id.to_string(),
      bindings: reports,
    };
    if failed {
      warn!(id = %id, orphans = ?report.orphaned(), "deleting_with_orphans");
    }

    match with_timeout(
      self.settings.call_timeout,
      self.function.delete_function(&deployment.id),
    )
    .await
    {
      Ok(()) => {}
      Err(e) if e.is_not_found() => {}
      Err(source) => {
        return Err(LifecycleError::Function {
          action: "delete",
          function: deployment.id.clone(),
          source,
        });
      }
    }

    // Orphans stay recorded so a later delete can still release them.
    let orphans: Vec<TriggerBinding> = report
      .bindings
      .iter()
      .filter(|r| !r.binding.is_released())
      .map(|r| r.binding.clone())
      .collect();
    if orphans.is_empty() {
      self.registry.delete(&self.settings.app_name, id).await?;
    } else {
      self.persist(id, &orphans).await?;
    }
    self.orchestrator.locks().forget(&deployment.id);
    info!(id = %id, "function_deleted");

    Ok(report)
  }

  async fn reconcile(
    &self,
    deployment: &FunctionDeployment,
    current: Option<TriggerBinding>,
    desired: Option<TriggerSpec>,
  ) -> Option<BindingReport> {
    if let Some(mut binding) = current {
      if desired.as_ref() == Some(&binding.spec) {
        let result = self.orchestrator.bind(deployment, &mut binding).await;
        return Some(BindingReport::new(binding, result));
      }

      if let Err(e) = self.orchestrator.unbind(deployment, &mut binding).await {
        return Some(BindingReport::new(binding, Err(e)));
      }
      info!(function = %deployment.name, kind = %binding.kind, "trigger_removed");
    }

    let mut binding = TriggerBinding::new(desired?);
    let result = self.orchestrator.bind(deployment, &mut binding).await;
    Some(BindingReport::new(binding, result))
  }

  async fn finish(
    &self,
    deployment: FunctionDeployment,
    bindings: Vec<BindingReport>,
  ) -> DeploymentReport {
    let recorded: Vec<TriggerBinding> = bindings.iter().map(|r| r.binding.clone()).collect();
    let persist_error = match self.persist(&deployment.id, &recorded).await {
      Ok(()) => None,
      Err(e) => {
        error!(id = %deployment.id, error = %e, "registry_persist_failed");
        Some(e.to_string())
      }
    };

    DeploymentReport {
      deployment,
      bindings,
      persist_error,
    }
  }

  /// Write `bindings` as the registry item of `id`, keeping the first
  /// creation time.
  async fn persist(&self, id: &str, bindings: &[TriggerBinding]) -> Result<(), LifecycleError> {
    let triggers = bindings
      .iter()
      .map(serde_json::to_value)
      .collect::<Result<Vec<_>, _>>()?;

    let mut item = RegistryItem::function(id, triggers);
    match self.registry.get(&self.settings.app_name, id).await {
      Ok(existing) => item.created_at = existing.created_at,
      Err(RegistryError::NotFound { .. }) => {}
      Err(e) => return Err(e.into()),
    }

    self.registry.put(&self.settings.app_name, &item).await?;
    Ok(())
  }

  fn request(&self, spec: &FunctionSpec) -> Result<CreateFunctionRequest, LifecycleError> {
    if spec.name.is_empty() {
      return Err(LifecycleError::InvalidSpec {
        message: "function name is empty".to_string(),
      });
    }

    let role = &self.settings.execution_role_name;
    if self.settings.account_id.is_empty() {
      return Err(LifecycleError::UnknownAccount { role: role.clone() });
    }

    Ok(CreateFunctionRequest {
      name: spec.name.clone(),
      code: spec.code.clone(),
      runtime: spec.runtime.clone(),
      role_arn: format!(
        "arn:{}:iam::{}:role/{}",
        self.settings.partition, self.settings.account_id, role
      ),
      publish: spec.publish,
      environment: spec.environment.clone(),
    })
  }

  fn deployment(&self, info: &FunctionInfo) -> FunctionDeployment {
    let account_id = if self.settings.account_id.is_empty() {
      info
        .arn
        .parse::<Arn>()
        .map(|arn| arn.account_id)
        .unwrap_or_default()
    } else {
      self.settings.account_id.clone()
    };

    FunctionDeployment::new(
      info,
      account_id,
      self.settings.region.clone(),
      self.settings.partition.clone(),
    )
  }

  /// A deployment rebuilt from its ARN alone, for tearing down the
  /// bindings of a function that no longer exists.
  fn detached(&self, id: &str) -> Result<FunctionDeployment, LifecycleError> {
    let arn: Arn = id
      .parse()
      .map_err(|_| LifecycleError::NotFound { id: id.to_string() })?;

    Ok(self.deployment(&FunctionInfo {
      name: arn.resource_name().to_string(),
      arn: id.to_string(),
      runtime: RuntimeDescriptor::default(),
      code_sha256: String::new(),
      last_modified: String::new(),
    }))
  }
}
