use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_lambda::Client;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, EventSourcePosition, FunctionCode, Runtime};
use serde_json::Value;
use tether_capability::{
  CapabilityError, CreateFunctionRequest, FunctionClient, FunctionInfo, PermissionGrant, Principal,
};
use tether_config::{CodeRef, RuntimeDescriptor};
use tracing::debug;

use crate::error::{missing, sdk_error};

const SERVICE: &str = "lambda";

/// Lambda-backed [`FunctionClient`].
#[derive(Debug, Clone)]
pub struct LambdaFunctionClient {
  client: Client,
}

impl LambdaFunctionClient {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

/// Builds a [`FunctionInfo`] from any response carrying a function
/// configuration.
macro_rules! function_info {
  ($out:expr) => {{
    let out = $out;
    FunctionInfo {
      name: out.function_name().unwrap_or_default().to_string(),
      arn: out
        .function_arn()
        .ok_or_else(|| missing(SERVICE, "function ARN"))?
        .to_string(),
      runtime: RuntimeDescriptor {
        handler: out.handler().unwrap_or_default().to_string(),
        memory_mb: u32::try_from(out.memory_size().unwrap_or_default()).unwrap_or_default(),
        timeout_secs: u32::try_from(out.timeout().unwrap_or_default()).unwrap_or_default(),
        runtime: out
          .runtime()
          .map(|r| r.as_str().to_string())
          .unwrap_or_default(),
      },
      code_sha256: out.code_sha256().unwrap_or_default().to_string(),
      last_modified: out.last_modified().unwrap_or_default().to_string(),
    }
  }};
}

/// Service principal allowed to invoke through a permission statement.
pub(crate) fn principal_service(principal: Principal) -> &'static str {
  match principal {
    Principal::Scheduler => "events.amazonaws.com",
    Principal::Gateway => "apigateway.amazonaws.com",
    Principal::Topic => "sns.amazonaws.com",
    Principal::ObjectStore => "s3.amazonaws.com",
  }
}

/// True if the policy document contains a statement with `statement_id`.
pub(crate) fn policy_has_statement(policy: &str, statement_id: &str) -> bool {
  serde_json::from_str::<Value>(policy)
    .ok()
    .and_then(|doc| {
      doc.get("Statement").and_then(Value::as_array).map(|statements| {
        statements
          .iter()
          .any(|s| s.get("Sid").and_then(Value::as_str) == Some(statement_id))
      })
    })
    .unwrap_or(false)
}

/// Streams need a starting position; queues must not have one.
fn starting_position(source_arn: &str) -> Option<EventSourcePosition> {
  (source_arn.contains(":dynamodb:") || source_arn.contains(":kinesis:"))
    .then_some(EventSourcePosition::Latest)
}

async fn read_zip(path: &std::path::Path) -> Result<Blob, CapabilityError> {
  tokio::fs::read(path).await.map(Blob::new).map_err(|e| {
    CapabilityError::invalid_request(format!("failed to read {}: {e}", path.display()))
  })
}

fn environment(request: &CreateFunctionRequest) -> Environment {
  let variables: HashMap<String, String> = request
    .environment
    .iter()
    .map(|(k, v)| (k.clone(), v.clone()))
    .collect();
  Environment::builder().set_variables(Some(variables)).build()
}

#[async_trait]
impl FunctionClient for LambdaFunctionClient {
  async fn create_function(
    &self,
    request: &CreateFunctionRequest,
  ) -> Result<FunctionInfo, CapabilityError> {
    let code = match &request.code {
      CodeRef::ZipFile { path } => FunctionCode::builder()
        .zip_file(read_zip(path).await?)
        .build(),
      CodeRef::Object { bucket, key } => FunctionCode::builder()
        .s3_bucket(bucket)
        .s3_key(key)
        .build(),
    };

    let out = self
      .client
      .create_function()
      .function_name(&request.name)
      .role(&request.role_arn)
      .handler(&request.runtime.handler)
      .runtime(Runtime::from(request.runtime.runtime.as_str()))
      .memory_size(i32::try_from(request.runtime.memory_mb).unwrap_or(i32::MAX))
      .timeout(i32::try_from(request.runtime.timeout_secs).unwrap_or(i32::MAX))
      .publish(request.publish)
      .environment(environment(request))
      .code(code)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;

    Ok(function_info!(out))
  }

  async fn get_function(&self, function: &str) -> Result<FunctionInfo, CapabilityError> {
    let out = self
      .client
      .get_function()
      .function_name(function)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;

    let configuration = out
      .configuration()
      .ok_or_else(|| missing(SERVICE, "function configuration"))?;
    Ok(function_info!(configuration))
  }

  async fn update_function(
    &self,
    function: &str,
    request: &CreateFunctionRequest,
  ) -> Result<FunctionInfo, CapabilityError> {
    self
      .client
      .update_function_configuration()
      .function_name(function)
      .role(&request.role_arn)
      .handler(&request.runtime.handler)
      .runtime(Runtime::from(request.runtime.runtime.as_str()))
      .memory_size(i32::try_from(request.runtime.memory_mb).unwrap_or(i32::MAX))
      .timeout(i32::try_from(request.runtime.timeout_secs).unwrap_or(i32::MAX))
      .environment(environment(request))
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;

    let update = self
      .client
      .update_function_code()
      .function_name(function)
      .publish(request.publish);
    let update = match &request.code {
      CodeRef::ZipFile { path } => update.zip_file(read_zip(path).await?),
      CodeRef::Object { bucket, key } => update.s3_bucket(bucket).s3_key(key),
    };
    let out = update.send().await.map_err(|e| sdk_error(SERVICE, e))?;

    Ok(function_info!(out))
  }

  async fn delete_function(&self, function: &str) -> Result<(), CapabilityError> {
    self
      .client
      .delete_function()
      .function_name(function)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;
    Ok(())
  }

  async fn add_permission(&self, grant: &PermissionGrant) -> Result<(), CapabilityError> {
    self
      .client
      .add_permission()
      .function_name(&grant.function)
      .statement_id(&grant.statement_id)
      .action("lambda:InvokeFunction")
      .principal(principal_service(grant.principal))
      .source_arn(&grant.source_arn)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;
    Ok(())
  }

  async fn has_permission(
    &self,
    function: &str,
    statement_id: &str,
  ) -> Result<bool, CapabilityError> {
    let result = self
      .client
      .get_policy()
      .function_name(function)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e));

    match result {
      Ok(out) => Ok(
        out
          .policy()
          .is_some_and(|policy| policy_has_statement(policy, statement_id)),
      ),
      // A function without any statement has no policy document at all.
      Err(e) if e.is_not_found() => Ok(false),
      Err(e) => Err(e),
    }
  }

  async fn remove_permission(
    &self,
    function: &str,
    statement_id: &str,
  ) -> Result<(), CapabilityError> {
    self
      .client
      .remove_permission()
      .function_name(function)
      .statement_id(statement_id)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;
    Ok(())
  }

  async fn create_event_source_mapping(
    &self,
    source_arn: &str,
    function: &str,
  ) -> Result<String, CapabilityError> {
    let out = self
      .client
      .create_event_source_mapping()
      .event_source_arn(source_arn)
      .function_name(function)
      .set_starting_position(starting_position(source_arn))
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;

    let uuid = out.uuid().ok_or_else(|| missing(SERVICE, "mapping uuid"))?;
    debug!(source_arn, uuid, "event source mapping created");
    Ok(uuid.to_string())
  }

  async fn find_event_source_mapping(
    &self,
    source_arn: &str,
    function: &str,
  ) -> Result<Option<String>, CapabilityError> {
    let out = self
      .client
      .list_event_source_mappings()
      .event_source_arn(source_arn)
      .function_name(function)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;

    Ok(
      out
        .event_source_mappings()
        .iter()
        .find_map(|m| m.uuid())
        .map(str::to_string),
    )
  }

  async fn delete_event_source_mapping(&self, mapping_id: &str) -> Result<(), CapabilityError> {
    self
      .client
      .delete_event_source_mapping()
      .uuid(mapping_id)
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;
    Ok(())
  }
}
