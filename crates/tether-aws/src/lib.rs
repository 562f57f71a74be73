//! Tether AWS
//!
//! Adapters from the tether capability traits onto the AWS SDK. A
//! [`ClientFactory`] turns a resolved [`Identity`](tether_credentials::Identity)
//! into a [`Capabilities`](tether_capability::Capabilities) bundle, one SDK
//! client per service, honouring per-service endpoint overrides.
//!
//! SDK retries are disabled: the capability layer promises a single attempt
//! per call, bounded by the caller's timeout.

mod attribute;
mod datastore;
mod error;
mod events;
mod factory;
mod function;
mod gateway;
mod messaging;
mod registry;
mod sts;

pub use attribute::{attribute_to_json, json_to_attribute};
pub use datastore::{DynamoTableClient, S3ObjectStoreClient};
pub use events::EventBridgeScheduler;
pub use factory::ClientFactory;
pub use function::LambdaFunctionClient;
pub use gateway::ApiGatewayRouteClient;
pub use messaging::{SnsTopicClient, SqsQueueClient};
pub use registry::DynamoRegistry;
pub use sts::{StsConnector, StsIdentityClient};
