use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_apigateway::Client;
use aws_sdk_apigateway::types::IntegrationType;
use tether_capability::{ApiResource, CapabilityError, IntegrationRequest, RouteClient};
use tether_config::HttpMethod;

use crate::error::sdk_error;

const SERVICE: &str = "apigateway";

/// Largest page the resources listing accepts.
const RESOURCE_PAGE_LIMIT: i32 = 500;

/// Request template that hands the raw JSON body to the function.
const PASSTHROUGH_TEMPLATE: &str = "$input.json('$')";

/// API Gateway (REST) backed [`RouteClient`].
#[derive(Debug, Clone)]
pub struct ApiGatewayRouteClient {
  client: Client,
}

impl ApiGatewayRouteClient {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl RouteClient for ApiGatewayRouteClient {
  async fn list_resources(&self, api_id: &str) -> Result<Vec<ApiResource>, CapabilityError> {
    let mut resources = Vec::new();
    let mut position: Option<String> = None;

    loop {
      let out = self
        .client
        .get_resources()
        .rest_api_id(api_id)
        .limit(RESOURCE_PAGE_LIMIT)
        .set_position(position.take())
        .send()
        .await
        .map_err(|e| sdk_error(SERVICE, e))?;

      resources.extend(out.items().iter().filter_map(|r| {
        Some(ApiResource {
          id: r.id()?.to_string(),
          path: r.path()?.to_string(),
        })
      }));

      match out.position() {
        Some(next) if !next.is_empty() => position = Some(next.to_string()),
        _ => break,
      }
    }

    Ok(resources)
  }

  async fn put_integration(&self, request: &IntegrationRequest) -> Result<(), CapabilityError> {
    let templates = HashMap::from([(
      request.content_type.clone(),
      PASSTHROUGH_TEMPLATE.to_string(),
    )]);

    self
      .client
      .put_integration()
      .rest_api_id(&request.api_id)
      .resource_id(&request.resource_id)
      .http_method(request.method.as_str())
      .r#type(IntegrationType::Aws)
      .integration_http_method("POST")
      .uri(&request.uri)
      .credentials(&request.role_arn)
      .set_request_templates(Some(templates))
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;
    Ok(())
  }

  async fn delete_integration(
    &self,
    api_id: &str,
    resource_id: &str,
    method: HttpMethod,
  ) -> Result<(), CapabilityError> {
    self
      .client
      .delete_integration()
      .rest_api_id(api_id)
      .resource_id(resource_id)
      .http_method(method.as_str())
      .send()
      .await
      .map_err(|e| sdk_error(SERVICE, e))?;
    Ok(())
  }
}
