use std::sync::Arc;

use async_trait::async_trait;
use tether_capability::{
  Arn, CapabilityError, FunctionClient, NotificationConfig, ObjectStoreClient, Principal,
  StreamView, TableClient,
};
use tether_config::{TriggerKind, TriggerSpec};

use super::{Provisioner, mismatched};
use crate::binding::{CreatedId, Role, TriggerBinding};
use crate::context::StepContext;
use crate::error::{Step, TriggerError};

const OBJECT_CREATED: &str = "s3:ObjectCreated:*";

/// A datastore identified by its ARN's service token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datastore {
  Table { name: String },
  Bucket { name: String, arn: String },
}

/// Classify a datastore ARN.
///
/// `dynamodb` table ARNs route to the change-stream path and `s3` ARNs to
/// the notification path. Other services are unsupported.
pub fn parse_datastore(datastore_id: &str) -> Result<Datastore, TriggerError> {
  let arn: Arn = datastore_id
    .parse()
    .map_err(|_| TriggerError::ResourceNotFound {
      message: format!("malformed datastore identifier '{datastore_id}'"),
    })?;

  match arn.service.as_str() {
    "dynamodb" => {
      let name = arn.resource_name().split('/').next().unwrap_or_default();
      if arn.resource_type() != Some("table") || name.is_empty() {
        return Err(TriggerError::ResourceNotFound {
          message: format!("'{datastore_id}' does not name a table"),
        });
      }
      Ok(Datastore::Table {
        name: name.to_string(),
      })
    }
    "s3" => {
      let name = arn.resource.split('/').next().unwrap_or_default();
      Ok(Datastore::Bucket {
        name: name.to_string(),
        arn: format!("arn:{}:s3:::{name}", arn.partition),
      })
    }
    other => Err(TriggerError::UnsupportedDatastoreKind {
      service: other.to_string(),
    }),
  }
}

/// Table: change stream -> stream mapping. A stream that was already
/// enabled is adopted for the mapping but not recorded.
/// Object store: invoke permission -> creation-event notification.
pub struct DatastoreProvisioner {
  table: Arc<dyn TableClient>,
  object_store: Arc<dyn ObjectStoreClient>,
  function: Arc<dyn FunctionClient>,
}

impl DatastoreProvisioner {
  pub fn new(
    table: Arc<dyn TableClient>,
    object_store: Arc<dyn ObjectStoreClient>,
    function: Arc<dyn FunctionClient>,
  ) -> Self {
    Self {
      table,
      object_store,
      function,
    }
  }

  fn notification_id(ctx: &StepContext<'_>) -> String {
    format!("tether-{}", ctx.deployment.name)
  }

  fn datastore(&self, binding: &TriggerBinding) -> Result<Datastore, TriggerError> {
    match &binding.spec {
      TriggerSpec::Datastore(spec) => parse_datastore(&spec.datastore_id),
      _ => Err(mismatched(self.kind(), binding)),
    }
  }
}

/// Table name from a stream ARN (`...:table/<name>/stream/<label>`).
fn table_from_stream(stream_arn: &str) -> Option<String> {
  let arn: Arn = stream_arn.parse().ok()?;
  arn.resource.split('/').nth(1).map(str::to_string)
}

#[async_trait]
impl Provisioner for DatastoreProvisioner {
  fn kind(&self) -> TriggerKind {
    TriggerKind::Datastore
  }

  async fn provision(
    &self,
    ctx: &StepContext<'_>,
    binding: &mut TriggerBinding,
  ) -> Result<(), TriggerError> {
    match self.datastore(binding)? {
      Datastore::Table { name } => {
        if binding.created(Role::StreamMapping).is_some() {
          return Ok(());
        }

        let stream_arn = match binding.created(Role::Stream) {
          Some(arn) => arn.to_string(),
          None => {
            let stream = ctx
              .provision(
                Step::EnableStream,
                self.table.enable_change_stream(&name, StreamView::NewImage),
              )
              .await?;
            // A stream enabled by someone else is used but never recorded,
            // so teardown leaves it running.
            if stream.newly_enabled {
              binding.record(Role::Stream, &stream.arn);
            } else if !stream.view.carries_new_image() {
              return Err(TriggerError::ProvisioningStepFailed {
                kind: self.kind(),
                step: Step::EnableStream,
                source: CapabilityError::conflict(format!(
                  "table {name} already streams {} records",
                  stream.view.as_str()
                )),
              });
            }
            stream.arn
          }
        };

        let mapping = ctx.map_source(self.function.as_ref(), &stream_arn).await?;
        binding.record(Role::StreamMapping, mapping);
      }
      Datastore::Bucket { name, arn } => {
        if binding.created(Role::Permission).is_none() {
          let statement_id = ctx
            .grant(self.function.as_ref(), Principal::ObjectStore, &arn)
            .await?;
          binding.record(Role::Permission, statement_id);
        }

        if binding.created(Role::Notification).is_none() {
          let config = NotificationConfig {
            id: Self::notification_id(ctx),
            function_arn: ctx.deployment.id.clone(),
            events: vec![OBJECT_CREATED.to_string()],
          };
          ctx
            .provision(
              Step::PutNotification,
              self.object_store.put_notification(&name, &config),
            )
            .await?;
          binding.record(Role::Notification, config.id);
        }
      }
    }

    Ok(())
  }

  async fn release(
    &self,
    ctx: &StepContext<'_>,
    binding: &TriggerBinding,
    created: &CreatedId,
  ) -> Result<(), TriggerError> {
    match created.role {
      Role::StreamMapping => {
        ctx
          .teardown(
            Step::DeleteMapping,
            self.function.delete_event_source_mapping(&created.id),
          )
          .await
      }
      Role::Stream => {
        let table = match table_from_stream(&created.id) {
          Some(table) => table,
          None => match self.datastore(binding)? {
            Datastore::Table { name } => name,
            Datastore::Bucket { .. } => return Ok(()),
          },
        };
        ctx
          .teardown(
            Step::DisableStream,
            self.table.disable_change_stream(&table),
          )
          .await
      }
      Role::Notification => {
        let Datastore::Bucket { name, .. } = self.datastore(binding)? else {
          return Ok(());
        };
        ctx
          .teardown(
            Step::RemoveNotification,
            self.object_store.remove_notification(&name, &created.id),
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
  fn test_table_arn_routes_to_stream_path() {
    assert_eq!(
      parse_datastore("arn:aws:dynamodb:us-east-1:123456789012:table/orders").unwrap(),
      Datastore::Table {
        name: "orders".to_string()
      }
    );
  }

  #[test]
  fn test_bucket_arn_routes_to_notification_path() {
    assert_eq!(
      parse_datastore("arn:aws:s3:::uploads").unwrap(),
      Datastore::Bucket {
        name: "uploads".to_string(),
        arn: "arn:aws:s3:::uploads".to_string()
      }
    );
  }

  #[test]
  fn test_other_services_are_unsupported() {
    for id in [
      "arn:aws:sqs:us-east-1:123456789012:jobs",
      "arn:aws:kinesis:us-east-1:123456789012:stream/clicks",
      "arn:aws:rds:us-east-1:123456789012:db:main",
    ] {
      assert!(
        matches!(
          parse_datastore(id),
          Err(TriggerError::UnsupportedDatastoreKind { .. })
        ),
        "{id}"
      );
    }
  }

  #[test]
  fn test_malformed_identifiers_are_not_found() {
    for id in ["orders", "arn:aws:dynamodb:us-east-1:123456789012:index/orders"] {
      assert!(
        matches!(
          parse_datastore(id),
          Err(TriggerError::ResourceNotFound { .. })
        ),
        "{id}"
      );
    }
  }

  #[test]
  fn test_table_from_stream_arn() {
    assert_eq!(
      table_from_stream("arn:aws:dynamodb:us-east-1:123456789012:table/orders/stream/2024"),
      Some("orders".to_string())
    );
  }
}
