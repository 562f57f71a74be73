use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use tether_registry::{Registry, RegistryError, RegistryItem, table_name};
use tracing::{debug, instrument};

use crate::attribute::{attribute_to_json, json_to_attribute};
use crate::error::sdk_error;

const ID: &str = "Id";
const TYPE: &str = "Type";
const CREATED_AT: &str = "CreatedAt";
const TRIGGERS: &str = "Triggers";

/// [`Registry`] stored in one DynamoDB table per application, keyed by `Id`.
///
/// The table is expected to exist; it is provisioned with the application.
#[derive(Debug, Clone)]
pub struct DynamoRegistry {
  client: Client,
}

impl DynamoRegistry {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

fn backend(error: impl std::fmt::Display) -> RegistryError {
  RegistryError::Backend {
    message: error.to_string(),
  }
}

fn key(id: &str) -> HashMap<String, AttributeValue> {
  HashMap::from([(ID.to_string(), AttributeValue::S(id.to_string()))])
}

pub(crate) fn to_item(item: &RegistryItem) -> HashMap<String, AttributeValue> {
  HashMap::from([
    (ID.to_string(), AttributeValue::S(item.id.clone())),
    (TYPE.to_string(), AttributeValue::S(item.kind.clone())),
    (
      CREATED_AT.to_string(),
      AttributeValue::S(item.created_at_compact()),
    ),
    (
      TRIGGERS.to_string(),
      AttributeValue::L(item.triggers.iter().map(json_to_attribute).collect()),
    ),
  ])
}

pub(crate) fn from_item(
  table: &str,
  attributes: &HashMap<String, AttributeValue>,
) -> Result<RegistryItem, RegistryError> {
  let text = |name: &str| {
    attributes
      .get(name)
      .and_then(|v| v.as_s().ok())
      .cloned()
      .ok_or_else(|| backend(format!("item in {table} has no string attribute {name}")))
  };

  let triggers = match attributes.get(TRIGGERS) {
    Some(AttributeValue::L(items)) => items.iter().map(attribute_to_json).collect(),
    Some(_) => return Err(backend(format!("{TRIGGERS} in {table} is not a list"))),
    None => Vec::new(),
  };

  Ok(RegistryItem {
    id: text(ID)?,
    kind: text(TYPE)?,
    created_at: RegistryItem::parse_created_at(&text(CREATED_AT)?)?,
    triggers,
  })
}

#[async_trait]
impl Registry for DynamoRegistry {
  #[instrument(name = "registry_put", skip(self, item), fields(id = %item.id))]
  async fn put(&self, app_name: &str, item: &RegistryItem) -> Result<(), RegistryError> {
    let table = table_name(app_name);
    self
      .client
      .put_item()
      .table_name(&table)
      .set_item(Some(to_item(item)))
      .send()
      .await
      .map_err(|e| backend(sdk_error("dynamodb", e)))?;

    debug!(table = %table, triggers = item.triggers.len(), "registry item written");
    Ok(())
  }

  #[instrument(name = "registry_get", skip(self))]
  async fn get(&self, app_name: &str, id: &str) -> Result<RegistryItem, RegistryError> {
    let table = table_name(app_name);
    let out = self
      .client
      .get_item()
      .table_name(&table)
      .set_key(Some(key(id)))
      .consistent_read(true)
      .send()
      .await
      .map_err(|e| backend(sdk_error("dynamodb", e)))?;

    match out.item() {
      Some(attributes) => from_item(&table, attributes),
      None => Err(RegistryError::NotFound {
        table,
        id: id.to_string(),
      }),
    }
  }

  #[instrument(name = "registry_delete", skip(self))]
  async fn delete(&self, app_name: &str, id: &str) -> Result<(), RegistryError> {
    self
      .client
      .delete_item()
      .table_name(table_name(app_name))
      .set_key(Some(key(id)))
      .send()
      .await
      .map_err(|e| backend(sdk_error("dynamodb", e)))?;
    Ok(())
  }
}
