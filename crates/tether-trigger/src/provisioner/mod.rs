//! Per-kind provisioning sequences.
//!
//! A provisioner skips every step whose identifier is already recorded on
//! the binding, so calling [`Provisioner::provision`] again on a failed
//! binding resumes where it stopped. Each provisioner holds only the
//! capabilities its sequence touches.

mod datastore;
mod route;
mod schedule;
mod subscription;

pub use datastore::{Datastore, DatastoreProvisioner, parse_datastore};
pub use route::RouteProvisioner;
pub use schedule::ScheduleProvisioner;
pub use subscription::SubscriptionProvisioner;

use async_trait::async_trait;
use tether_config::TriggerKind;

use crate::binding::{CreatedId, TriggerBinding};
use crate::context::StepContext;
use crate::error::TriggerError;

#[async_trait]
pub trait Provisioner: Send + Sync {
  fn kind(&self) -> TriggerKind;

  /// Run the remaining steps of the bind sequence, recording each created
  /// identifier on `binding` as soon as it exists.
  async fn provision(
    &self,
    ctx: &StepContext<'_>,
    binding: &mut TriggerBinding,
  ) -> Result<(), TriggerError>;

  /// Release one recorded identifier.
  async fn release(
    &self,
    ctx: &StepContext<'_>,
    binding: &TriggerBinding,
    created: &CreatedId,
  ) -> Result<(), TriggerError>;
}

/// The error for a binding handed to the wrong provisioner.
pub(crate) fn mismatched(kind: TriggerKind, binding: &TriggerBinding) -> TriggerError {
  TriggerError::InvalidState {
    kind,
    state: binding.state,
    action: "provision a spec of another kind",
  }
}
