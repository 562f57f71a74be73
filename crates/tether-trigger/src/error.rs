use std::fmt;

use serde::{Deserialize, Serialize};
use tether_capability::CapabilityError;
use tether_config::TriggerKind;

use crate::binding::BindingState;

/// A single control-plane step of a provisioning or teardown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
  CreateRule,
  GrantPermission,
  AttachTarget,
  ResolveResource,
  PutIntegration,
  CreateQueue,
  ReadQueueAttributes,
  Subscribe,
  CreateMapping,
  EnableStream,
  PutNotification,
  RemoveTarget,
  RevokePermission,
  DeleteRule,
  RemoveIntegration,
  Unsubscribe,
  DeleteMapping,
  DeleteQueue,
  DisableStream,
  RemoveNotification,
}

impl Step {
  pub fn as_str(&self) -> &'static str {
    match self {
      Step::CreateRule => "create_rule",
      Step::GrantPermission => "grant_permission",
      Step::AttachTarget => "attach_target",
      Step::ResolveResource => "resolve_resource",
      Step::PutIntegration => "put_integration",
      Step::CreateQueue => "create_queue",
      Step::ReadQueueAttributes => "read_queue_attributes",
      Step::Subscribe => "subscribe",
      Step::CreateMapping => "create_mapping",
      Step::EnableStream => "enable_stream",
      Step::PutNotification => "put_notification",
      Step::RemoveTarget => "remove_target",
      Step::RevokePermission => "revoke_permission",
      Step::DeleteRule => "delete_rule",
      Step::RemoveIntegration => "remove_integration",
      Step::Unsubscribe => "unsubscribe",
      Step::DeleteMapping => "delete_mapping",
      Step::DeleteQueue => "delete_queue",
      Step::DisableStream => "disable_stream",
      Step::RemoveNotification => "remove_notification",
    }
  }
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Errors raised while binding or unbinding a trigger.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TriggerError {
  /// A referenced resource is absent or its identifier is malformed.
  #[error("resource not found: {message}")]
  ResourceNotFound { message: String },

  #[error("unsupported datastore kind '{service}'")]
  UnsupportedDatastoreKind { service: String },

  #[error("{kind} trigger provisioning failed at step {step}")]
  ProvisioningStepFailed {
    kind: TriggerKind,
    step: Step,
    #[source]
    source: CapabilityError,
  },

  #[error("{kind} trigger teardown failed at step {step}")]
  TeardownStepFailed {
    kind: TriggerKind,
    step: Step,
    #[source]
    source: CapabilityError,
  },

  /// The binding is mid-transition (for example, persisted by a process
  /// that stopped half-way) and cannot be driven from here.
  #[error("{kind} trigger binding is {state}, cannot {action}")]
  InvalidState {
    kind: TriggerKind,
    state: BindingState,
    action: &'static str,
  },
}

impl TriggerError {
  /// The failing step, for step failures.
  pub fn step(&self) -> Option<Step> {
    match self {
      TriggerError::ProvisioningStepFailed { step, .. }
      | TriggerError::TeardownStepFailed { step, .. } => Some(*step),
      _ => None,
    }
  }
}
