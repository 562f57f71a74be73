//! Tether Credentials
//!
//! Resolves a [`ProviderConfig`](tether_config::ProviderConfig) into a
//! validated [`Identity`]. Providers are consulted in a fixed order and the
//! first one that yields a complete key pair wins:
//!
//! 1. static credentials from the configuration
//! 2. the process environment
//! 3. the shared credentials file
//!
//! If a role ARN is configured, the winning credentials are exchanged for
//! role credentials. Unless skipped, the result is then checked with a
//! "who am I" call that also supplies the account id and partition.
//!
//! The resolver never retries. A failed resolution is reported once.

mod error;
mod identity;
mod profile;
mod provider;
mod region;
mod resolver;
mod source;

pub use error::CredentialError;
pub use identity::Identity;
pub use profile::{ProfileSet, expand_home};
pub use provider::{
  CredentialChain, CredentialProvider, EnvLookup, EnvironmentProvider, SharedProfileProvider,
  StaticProvider, process_env,
};
pub use region::{partition_for_region, validate_region};
pub use resolver::CredentialResolver;
pub use source::CredentialSource;
