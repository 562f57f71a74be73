use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tether_config::{CodeRef, RuntimeDescriptor};

use crate::error::CapabilityError;

/// Services allowed to invoke a function through a permission statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Principal {
  Scheduler,
  Gateway,
  Topic,
  ObjectStore,
}

impl Principal {
  pub fn as_str(&self) -> &'static str {
    match self {
      Principal::Scheduler => "scheduler",
      Principal::Gateway => "gateway",
      Principal::Topic => "topic",
      Principal::ObjectStore => "object-store",
    }
  }
}

/// Request to create or reconfigure a function.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateFunctionRequest {
  pub name: String,
  pub code: CodeRef,
  pub runtime: RuntimeDescriptor,
  /// Execution role assumed by the function.
  pub role_arn: String,
  pub publish: bool,
  pub environment: BTreeMap<String, String>,
}

/// Control-plane view of a deployed function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
  pub name: String,
  pub arn: String,
  pub runtime: RuntimeDescriptor,
  pub code_sha256: String,
  pub last_modified: String,
}

/// One invoke-permission statement on a function's policy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
  pub function: String,
  pub statement_id: String,
  pub principal: Principal,
  /// Only invocations originating from this resource are permitted.
  pub source_arn: String,
}

/// Function management: deployments, invoke permissions and event-source
/// mappings.
#[async_trait]
pub trait FunctionClient: Send + Sync {
  async fn create_function(
    &self,
    request: &CreateFunctionRequest,
  ) -> Result<FunctionInfo, CapabilityError>;

  /// Returns [`CapabilityError::NotFound`] if the function does not exist.
  async fn get_function(&self, function: &str) -> Result<FunctionInfo, CapabilityError>;

  /// Replace code and configuration of an existing function.
  async fn update_function(
    &self,
    function: &str,
    request: &CreateFunctionRequest,
  ) -> Result<FunctionInfo, CapabilityError>;

  async fn delete_function(&self, function: &str) -> Result<(), CapabilityError>;

  /// Add a statement to the function's policy document.
  ///
  /// Grants against the same function must not run concurrently: the
  /// document is read-modify-written by the service.
  async fn add_permission(&self, grant: &PermissionGrant) -> Result<(), CapabilityError>;

  async fn has_permission(
    &self,
    function: &str,
    statement_id: &str,
  ) -> Result<bool, CapabilityError>;

  async fn remove_permission(
    &self,
    function: &str,
    statement_id: &str,
  ) -> Result<(), CapabilityError>;

  /// Create a poller from a queue or stream to the function. Returns the
  /// mapping's identifier.
  async fn create_event_source_mapping(
    &self,
    source_arn: &str,
    function: &str,
  ) -> Result<String, CapabilityError>;

  /// Look up an existing mapping between `source_arn` and `function`.
  async fn find_event_source_mapping(
    &self,
    source_arn: &str,
    function: &str,
  ) -> Result<Option<String>, CapabilityError>;

  async fn delete_event_source_mapping(&self, mapping_id: &str) -> Result<(), CapabilityError>;
}
