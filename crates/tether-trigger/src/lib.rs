//! Tether Trigger
//!
//! Wires a deployed function to its trigger sources. Each [`TriggerKind`]
//! has a [`Provisioner`] that runs a fixed sequence of control-plane steps
//! and records every identifier it creates on the [`TriggerBinding`]. The
//! [`TriggerOrchestrator`] drives bindings through their state machine:
//!
//! ```text
//! Absent -> Provisioning -> Active -> Deprovisioning -> Absent
//!                \                         /
//!                 `-------> Error <--------'
//! ```
//!
//! A failed step leaves the binding in `Error` with the identifiers created
//! so far still recorded. Nothing is rolled back automatically. Binding
//! again resumes from the first step not yet recorded; unbinding releases
//! the recorded identifiers in reverse creation order.
//!
//! [`TriggerKind`]: tether_config::TriggerKind

mod binding;
mod context;
mod deployment;
mod error;
mod locks;
mod orchestrator;
mod provisioner;

pub use binding::{BindingState, CreatedId, Role, TriggerBinding};
pub use context::StepContext;
pub use deployment::FunctionDeployment;
pub use error::{Step, TriggerError};
pub use locks::{DeploymentLock, DeploymentLocks};
pub use orchestrator::TriggerOrchestrator;
pub use provisioner::{
  Datastore, DatastoreProvisioner, Provisioner, RouteProvisioner, ScheduleProvisioner,
  SubscriptionProvisioner, parse_datastore,
};
