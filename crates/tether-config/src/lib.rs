//! Tether Config
//!
//! This crate contains the serializable configuration types for tether.
//! These types describe what an operator wants deployed before any call
//! reaches the control plane:
//!
//! - [`ProviderConfig`] selects the region, the application name that keys
//!   the registry, and the layered credential sources.
//! - [`FunctionSpec`] describes a deployable function and the trigger
//!   sources wired to it.
//!
//! Trigger declarations are a closed set of per-kind payloads. A
//! [`TriggerSet`] carries at most one of each kind, so a deployment with
//! two schedule blocks cannot be expressed.

mod function;
mod provider;
mod trigger;

pub use function::{CodeRef, FunctionSpec, RuntimeDescriptor};
pub use provider::{AssumeRoleConfig, ProviderConfig};
pub use trigger::{
  DatastoreTrigger, HttpMethod, InvalidMethod, RouteTrigger, ScheduleTrigger, SubscriptionTrigger,
  TriggerKind, TriggerSet, TriggerSpec,
};
