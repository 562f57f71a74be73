use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, RwLock};

/// Per-deployment coordination.
#[derive(Default)]
pub struct DeploymentLock {
  /// Binds share it; unbinds take it exclusively, so teardown waits for
  /// any in-flight bind on the same deployment.
  pub lifecycle: RwLock<()>,
  /// Serializes edits of the deployment's permission policy document.
  pub permissions: AsyncMutex<()>,
}

/// Lazily created [`DeploymentLock`]s keyed by deployment id.
#[derive(Clone, Default)]
pub struct DeploymentLocks {
  locks: Arc<Mutex<HashMap<String, Arc<DeploymentLock>>>>,
}

impl DeploymentLocks {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, deployment_id: &str) -> Arc<DeploymentLock> {
    self
      .locks
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(deployment_id.to_string())
      .or_default()
      .clone()
  }

  /// Drop the lock of a deleted deployment.
  pub fn forget(&self, deployment_id: &str) {
    self
      .locks
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(deployment_id);
  }

  pub fn len(&self) -> usize {
    self
      .locks
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_same_id_shares_lock() {
    let locks = DeploymentLocks::new();
    let a = locks.get("fn-1");
    let b = locks.get("fn-1");
    let c = locks.get("fn-2");

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));

    locks.forget("fn-1");
    assert_eq!(locks.len(), 1);
  }
}
