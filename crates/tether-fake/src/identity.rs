use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tether_capability::{
  AssumeRoleRequest, CallerIdentity, CapabilityError, Credentials, IdentityClient,
  IdentityConnector,
};

use crate::control_plane::TEST_ACCOUNT;

/// One recorded identity-provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCall {
  GetCallerIdentity { access_key_id: String },
  AssumeRole {
    access_key_id: String,
    request: AssumeRoleRequest,
  },
}

struct Script {
  caller: Result<CallerIdentity, CapabilityError>,
  assumed: Result<Credentials, CapabilityError>,
  calls: Vec<IdentityCall>,
}

/// Scripted identity provider.
///
/// By default every caller resolves to [`TEST_ACCOUNT`] in the `aws`
/// partition and role exchanges return `ASIAASSUMED` credentials.
#[derive(Clone)]
pub struct FakeIdentityConnector {
  script: Arc<Mutex<Script>>,
}

impl Default for FakeIdentityConnector {
  fn default() -> Self {
    Self {
      script: Arc::new(Mutex::new(Script {
        caller: Ok(CallerIdentity {
          account_id: TEST_ACCOUNT.to_string(),
          arn: format!("arn:aws:iam::{TEST_ACCOUNT}:user/tester"),
          partition: "aws".to_string(),
        }),
        assumed: Ok(Credentials::new(
          "ASIAASSUMED",
          "assumed-secret",
          Some("assumed-token".to_string()),
        )),
        calls: Vec::new(),
      })),
    }
  }
}

impl FakeIdentityConnector {
  pub fn new() -> Self {
    Self::default()
  }

  fn script(&self) -> MutexGuard<'_, Script> {
    self.script.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn with_account(self, account_id: &str) -> Self {
    if let Ok(caller) = &mut self.script().caller {
      caller.account_id = account_id.to_string();
    }
    self
  }

  /// Make every "who am I" call fail with `error`.
  pub fn reject_caller(self, error: CapabilityError) -> Self {
    self.script().caller = Err(error);
    self
  }

  /// Make every role exchange fail with `error`.
  pub fn reject_assume_role(self, error: CapabilityError) -> Self {
    self.script().assumed = Err(error);
    self
  }

  pub fn calls(&self) -> Vec<IdentityCall> {
    self.script().calls.clone()
  }
}

impl IdentityConnector for FakeIdentityConnector {
  fn connect(&self, credentials: &Credentials, _region: &str) -> Arc<dyn IdentityClient> {
    Arc::new(FakeIdentityClient {
      script: self.script.clone(),
      access_key_id: credentials.access_key_id.clone(),
    })
  }
}

struct FakeIdentityClient {
  script: Arc<Mutex<Script>>,
  access_key_id: String,
}

#[async_trait]
impl IdentityClient for FakeIdentityClient {
  async fn get_caller_identity(&self) -> Result<CallerIdentity, CapabilityError> {
    let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
    script.calls.push(IdentityCall::GetCallerIdentity {
      access_key_id: self.access_key_id.clone(),
    });
    script.caller.clone()
  }

  async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<Credentials, CapabilityError> {
    let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
    script.calls.push(IdentityCall::AssumeRole {
      access_key_id: self.access_key_id.clone(),
      request: request.clone(),
    });
    script.assumed.clone()
  }
}
