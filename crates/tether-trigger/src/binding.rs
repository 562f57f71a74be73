use std::fmt;

use serde::{Deserialize, Serialize};
use tether_config::{TriggerKind, TriggerSpec};

/// What a recorded identifier is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
  Rule,
  Target,
  Permission,
  Integration,
  Queue,
  Subscription,
  Mapping,
  Stream,
  StreamMapping,
  Notification,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Rule => "rule",
      Role::Target => "target",
      Role::Permission => "permission",
      Role::Integration => "integration",
      Role::Queue => "queue",
      Role::Subscription => "subscription",
      Role::Mapping => "mapping",
      Role::Stream => "stream",
      Role::StreamMapping => "streamMapping",
      Role::Notification => "notification",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A control-plane identifier created while binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedId {
  pub role: Role,
  pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingState {
  Absent,
  Provisioning,
  Active,
  Deprovisioning,
  Error,
}

impl fmt::Display for BindingState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      BindingState::Absent => "absent",
      BindingState::Provisioning => "provisioning",
      BindingState::Active => "active",
      BindingState::Deprovisioning => "deprovisioning",
      BindingState::Error => "error",
    };
    f.write_str(s)
  }
}

/// The control-plane objects wiring one trigger spec to a deployment.
///
/// `created_ids` is kept in creation order and is exactly the set of
/// identifiers needed to reverse the bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerBinding {
  pub kind: TriggerKind,
  pub spec: TriggerSpec,
  pub state: BindingState,
  #[serde(default)]
  pub created_ids: Vec<CreatedId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_error: Option<String>,
}

impl TriggerBinding {
  pub fn new(spec: TriggerSpec) -> Self {
    Self {
      kind: spec.kind(),
      spec,
      state: BindingState::Absent,
      created_ids: Vec::new(),
      last_error: None,
    }
  }

  /// The identifier recorded for `role`, if that step already ran.
  pub fn created(&self, role: Role) -> Option<&str> {
    self
      .created_ids
      .iter()
      .find(|c| c.role == role)
      .map(|c| c.id.as_str())
  }

  pub fn record(&mut self, role: Role, id: impl Into<String>) {
    self.created_ids.push(CreatedId {
      role,
      id: id.into(),
    });
  }

  /// True if the binding holds no control-plane objects and is not mid-transition.
  pub fn is_released(&self) -> bool {
    self.state == BindingState::Absent && self.created_ids.is_empty()
  }

  pub(crate) fn transition(&mut self, state: BindingState) {
    self.state = state;
    if state != BindingState::Error {
      self.last_error = None;
    }
  }

  pub(crate) fn fail(&mut self, error: &impl fmt::Display) {
    self.state = BindingState::Error;
    self.last_error = Some(error.to_string());
  }
}
