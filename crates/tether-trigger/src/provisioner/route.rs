use std::sync::Arc;

use async_trait::async_trait;
use tether_capability::{
  CapabilityError, FunctionClient, IntegrationRequest, Principal, RouteClient,
};
use tether_config::{HttpMethod, TriggerKind, TriggerSpec};

use super::{Provisioner, mismatched};
use crate::binding::{CreatedId, Role, TriggerBinding};
use crate::context::StepContext;
use crate::error::{Step, TriggerError};

/// Resolve resource -> invoke permission -> method integration.
///
/// The resource is resolved before anything is created, so a missing path
/// leaves nothing behind.
pub struct RouteProvisioner {
  route: Arc<dyn RouteClient>,
  function: Arc<dyn FunctionClient>,
  execution_role: String,
}

impl RouteProvisioner {
  pub fn new(
    route: Arc<dyn RouteClient>,
    function: Arc<dyn FunctionClient>,
    execution_role: impl Into<String>,
  ) -> Self {
    Self {
      route,
      function,
      execution_role: execution_role.into(),
    }
  }
}

/// Recorded integration ids are `api/resource/METHOD`.
fn integration_id(api_id: &str, resource_id: &str, method: HttpMethod) -> String {
  format!("{api_id}/{resource_id}/{method}")
}

fn parse_integration_id(id: &str) -> Option<(&str, &str, HttpMethod)> {
  let mut parts = id.splitn(3, '/');
  let api_id = parts.next()?;
  let resource_id = parts.next()?;
  let method = parts.next()?.parse().ok()?;
  Some((api_id, resource_id, method))
}

#[async_trait]
impl Provisioner for RouteProvisioner {
  fn kind(&self) -> TriggerKind {
    TriggerKind::Route
  }

  async fn provision(
    &self,
    ctx: &StepContext<'_>,
    binding: &mut TriggerBinding,
  ) -> Result<(), TriggerError> {
    let TriggerSpec::Route(spec) = binding.spec.clone() else {
      return Err(mismatched(self.kind(), binding));
    };

    let resources = ctx
      .provision(
        Step::ResolveResource,
        self.route.list_resources(&spec.api_id),
      )
      .await?;
    let resource = resources
      .into_iter()
      .find(|r| r.path == spec.path)
      .ok_or_else(|| TriggerError::ProvisioningStepFailed {
        kind: TriggerKind::Route,
        step: Step::ResolveResource,
        source: CapabilityError::not_found(format!(
          "resource with path '{}' on api {}",
          spec.path, spec.api_id
        )),
      })?;

    if binding.created(Role::Permission).is_none() {
      let source_arn = ctx.deployment.execute_api_source_arn(&spec.api_id);
      let statement_id = ctx
        .grant(self.function.as_ref(), Principal::Gateway, &source_arn)
        .await?;
      binding.record(Role::Permission, statement_id);
    }

    if binding.created(Role::Integration).is_none() {
      let request = IntegrationRequest {
        api_id: spec.api_id.clone(),
        resource_id: resource.id.clone(),
        method: spec.method,
        uri: ctx.deployment.integration_uri(),
        role_arn: ctx.deployment.role_arn(&self.execution_role),
        content_type: spec.content_type.clone(),
      };
      ctx
        .provision(Step::PutIntegration, self.route.put_integration(&request))
        .await?;
      binding.record(
        Role::Integration,
        integration_id(&spec.api_id, &resource.id, spec.method),
      );
    }

    Ok(())
  }

  async fn release(
    &self,
    ctx: &StepContext<'_>,
    _binding: &TriggerBinding,
    created: &CreatedId,
  ) -> Result<(), TriggerError> {
    match created.role {
      Role::Integration => {
        let Some((api_id, resource_id, method)) = parse_integration_id(&created.id) else {
          return Err(TriggerError::ResourceNotFound {
            message: format!("malformed integration id '{}'", created.id),
          });
        };
        ctx
          .teardown(
            Step::RemoveIntegration,
            self.route.delete_integration(api_id, resource_id, method),
          )
          .await
      }
      Role::Permission => ctx.revoke(self.function.as_ref(), &created.id).await,
      _ => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_integration_id_round_trip() {
    let id = integration_id("a1b2", "res-0", HttpMethod::Post);
    assert_eq!(id, "a1b2/res-0/POST");
    assert_eq!(
      parse_integration_id(&id),
      Some(("a1b2", "res-0", HttpMethod::Post))
    );
    assert_eq!(parse_integration_id("a1b2/res-0"), None);
  }
}
