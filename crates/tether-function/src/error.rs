use tether_capability::CapabilityError;
use tether_registry::RegistryError;
use tether_trigger::TriggerBinding;
use thiserror::Error;

/// Errors returned by [`FunctionLifecycle`](crate::FunctionLifecycle).
///
/// Per-binding failures are not errors at this level; they are carried by
/// the returned reports.
#[derive(Debug, Error)]
pub enum LifecycleError {
  #[error("function '{id}' not found")]
  NotFound { id: String },

  /// A call against the function itself failed.
  #[error("failed to {action} function '{function}': {source}")]
  Function {
    action: &'static str,
    function: String,
    #[source]
    source: CapabilityError,
  },

  #[error("invalid function spec: {message}")]
  InvalidSpec { message: String },

  /// Credential validation was skipped and nothing else named the account.
  #[error("account id unknown, cannot derive the ARN of role '{role}'")]
  UnknownAccount { role: String },

  /// Bindings still hold control-plane objects. Bindings in `Error` can be
  /// overridden with `force`; mid-transition bindings cannot.
  #[error("deployment '{id}' still has {} binding(s) awaiting teardown", .pending.len())]
  DeletionRefused {
    id: String,
    pending: Vec<TriggerBinding>,
  },

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error("failed to decode trigger binding: {0}")]
  Decode(#[from] serde_json::Error),
}
