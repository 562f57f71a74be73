//! Tether Capability
//!
//! Narrow interfaces onto the cloud control plane. Each provisioner asks for
//! exactly the capabilities it uses, so tests can substitute an in-memory
//! double and production code can plug in SDK-backed adapters.
//!
//! Implementations are expected to be reliable, already-authenticated RPC
//! wrappers: no retries happen at this layer. Every call made through
//! [`with_timeout`] is bounded by a caller-supplied limit, and an elapsed
//! limit surfaces as [`CapabilityError::Timeout`].

mod arn;
mod datastore;
mod error;
mod events;
mod function;
mod identity;
mod timeout;

use std::sync::Arc;

pub use arn::{Arn, ArnError};
pub use datastore::{ChangeStream, NotificationConfig, ObjectStoreClient, StreamView, TableClient};
pub use error::CapabilityError;
pub use events::{
  ApiResource, IntegrationRequest, Protocol, QueueClient, RouteClient, SchedulerClient, TopicClient,
};
pub use function::{CreateFunctionRequest, FunctionClient, FunctionInfo, PermissionGrant, Principal};
pub use identity::{
  AssumeRoleRequest, CallerIdentity, Credentials, IdentityClient, IdentityConnector,
};
pub use timeout::with_timeout;

/// The per-service handles produced for one resolved identity.
#[derive(Clone)]
pub struct Capabilities {
  pub function: Arc<dyn FunctionClient>,
  pub scheduler: Arc<dyn SchedulerClient>,
  pub route: Arc<dyn RouteClient>,
  pub topic: Arc<dyn TopicClient>,
  pub queue: Arc<dyn QueueClient>,
  pub table: Arc<dyn TableClient>,
  pub object_store: Arc<dyn ObjectStoreClient>,
}
