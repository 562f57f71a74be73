use serde::{Deserialize, Serialize};
use tether_capability::FunctionInfo;
use tether_config::{CodeRef, RuntimeDescriptor};

/// A deployed function, addressed by its control-plane ARN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeployment {
  /// Control-plane identifier, assigned on create.
  pub id: String,
  pub name: String,
  /// Known when the deployment was created or updated from a spec.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub code: Option<CodeRef>,
  pub runtime: RuntimeDescriptor,
  pub code_sha256: String,
  pub last_modified: String,
  pub account_id: String,
  pub region: String,
  pub partition: String,
}

impl FunctionDeployment {
  pub fn new(
    info: &FunctionInfo,
    account_id: impl Into<String>,
    region: impl Into<String>,
    partition: impl Into<String>,
  ) -> Self {
    Self {
      id: info.arn.clone(),
      name: info.name.clone(),
      code: None,
      runtime: info.runtime.clone(),
      code_sha256: info.code_sha256.clone(),
      last_modified: info.last_modified.clone(),
      account_id: account_id.into(),
      region: region.into(),
      partition: partition.into(),
    }
  }

  pub fn with_code(mut self, code: CodeRef) -> Self {
    self.code = Some(code);
    self
  }

  /// Refresh the fields the control plane owns.
  pub fn refresh(&mut self, info: &FunctionInfo) {
    self.runtime = info.runtime.clone();
    self.code_sha256 = info.code_sha256.clone();
    self.last_modified = info.last_modified.clone();
  }

  /// Source ARN pattern covering every stage and method of an HTTP API.
  pub fn execute_api_source_arn(&self, api_id: &str) -> String {
    format!(
      "arn:{}:execute-api:{}:{}:{}/*",
      self.partition, self.region, self.account_id, api_id
    )
  }

  /// The URI a gateway integration uses to invoke this function.
  pub fn integration_uri(&self) -> String {
    format!(
      "arn:{}:apigateway:{}:lambda:path/2015-03-31/functions/{}/invocations",
      self.partition, self.region, self.id
    )
  }

  pub fn role_arn(&self, role_name: &str) -> String {
    format!(
      "arn:{}:iam::{}:role/{}",
      self.partition, self.account_id, role_name
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn deployment() -> FunctionDeployment {
    let info = FunctionInfo {
      name: "fn-1".to_string(),
      arn: "arn:aws:lambda:us-east-1:123456789012:function:fn-1".to_string(),
      runtime: RuntimeDescriptor::default(),
      code_sha256: "sha".to_string(),
      last_modified: "now".to_string(),
    };
    FunctionDeployment::new(&info, "123456789012", "us-east-1", "aws").with_code(CodeRef::Object {
      bucket: "artifacts".to_string(),
      key: "fn-1.zip".to_string(),
    })
  }

  #[test]
  fn test_derived_arns() {
    let d = deployment();

    assert_eq!(
      d.execute_api_source_arn("a1b2"),
      "arn:aws:execute-api:us-east-1:123456789012:a1b2/*"
    );
    assert_eq!(
      d.integration_uri(),
      "arn:aws:apigateway:us-east-1:lambda:path/2015-03-31/functions/\
       arn:aws:lambda:us-east-1:123456789012:function:fn-1/invocations"
    );
    assert_eq!(
      d.role_arn("TetherInvokeRole"),
      "arn:aws:iam::123456789012:role/TetherInvokeRole"
    );
  }
}
