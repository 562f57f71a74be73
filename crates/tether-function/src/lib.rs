//! Tether Function
//!
//! Create, read, update and delete a function deployment together with its
//! trigger bindings.
//!
//! The deployment is created first so that its identifier exists for the
//! trigger provisioners. Each declared trigger is then bound independently:
//! a failed binding neither rolls back the deployment nor affects its
//! siblings. Callers get a per-binding [`BindingReport`] instead of one
//! aggregated failure, and the bindings are persisted to the
//! [`Registry`](tether_registry::Registry) so a later run can reconcile or
//! tear them down.

mod error;
mod lifecycle;
mod report;

pub use error::LifecycleError;
pub use lifecycle::{FunctionLifecycle, LifecycleSettings};
pub use report::{BindingReport, DeleteReport, DeploymentReport};
