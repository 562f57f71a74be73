use serde::{Serialize, Serializer};
use tether_trigger::{BindingState, CreatedId, FunctionDeployment, TriggerBinding, TriggerError};

/// Outcome of one binding within a lifecycle operation.
#[derive(Debug, Clone, Serialize)]
pub struct BindingReport {
  pub binding: TriggerBinding,
  #[serde(serialize_with = "error_message", skip_serializing_if = "Option::is_none")]
  pub error: Option<TriggerError>,
}

impl BindingReport {
  pub fn new(binding: TriggerBinding, result: Result<(), TriggerError>) -> Self {
    Self {
      binding,
      error: result.err(),
    }
  }

  pub fn is_ok(&self) -> bool {
    self.error.is_none()
  }
}

/// Result of creating or updating a deployment.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
  pub deployment: FunctionDeployment,
  pub bindings: Vec<BindingReport>,
  /// Set when the bindings could not be written to the registry.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub persist_error: Option<String>,
}

impl DeploymentReport {
  /// True if every binding is active and the registry is up to date.
  pub fn is_success(&self) -> bool {
    self.persist_error.is_none() && self.bindings.iter().all(BindingReport::is_ok)
  }

  pub fn failed(&self) -> impl Iterator<Item = &BindingReport> {
    self.bindings.iter().filter(|r| !r.is_ok())
  }
}

/// Result of deleting a deployment.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
  pub id: String,
  pub bindings: Vec<BindingReport>,
}

impl DeleteReport {
  /// Identifiers left behind by bindings that failed teardown and were
  /// overridden.
  pub fn orphaned(&self) -> Vec<&CreatedId> {
    self
      .bindings
      .iter()
      .filter(|r| r.binding.state == BindingState::Error)
      .flat_map(|r| r.binding.created_ids.iter())
      .collect()
  }
}

fn error_message<S: Serializer>(error: &Option<TriggerError>, s: S) -> Result<S::Ok, S::Error> {
  match error {
    Some(e) => s.serialize_some(&e.to_string()),
    None => s.serialize_none(),
  }
}
