use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{StreamSpecification, StreamViewType};
use aws_sdk_s3::types::{Event, LambdaFunctionConfiguration, NotificationConfiguration};
use tether_capability::{
  CapabilityError, ChangeStream, NotificationConfig, ObjectStoreClient, StreamView, TableClient,
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::error::{missing, sdk_error};

fn stream_view(raw: &str) -> Option<StreamView> {
  match raw {
    "NEW_IMAGE" => Some(StreamView::NewImage),
    "OLD_IMAGE" => Some(StreamView::OldImage),
    "NEW_AND_OLD_IMAGES" => Some(StreamView::NewAndOldImages),
    "KEYS_ONLY" => Some(StreamView::KeysOnly),
    _ => None,
  }
}

/// DynamoDB-backed [`TableClient`].
#[derive(Debug, Clone)]
pub struct DynamoTableClient {
  client: aws_sdk_dynamodb::Client,
}

impl DynamoTableClient {
  pub fn new(client: aws_sdk_dynamodb::Client) -> Self {
    Self { client }
  }

  /// The enabled change stream of `table`, if any.
  async fn current_stream(&self, table: &str) -> Result<Option<ChangeStream>, CapabilityError> {
    let out = self
      .client
      .describe_table()
      .table_name(table)
      .send()
      .await
      .map_err(|e| sdk_error("dynamodb", e))?;

    let Some(description) = out.table() else {
      return Ok(None);
    };
    let Some(spec) = description
      .stream_specification()
      .filter(|spec| spec.stream_enabled())
    else {
      return Ok(None);
    };
    let Some(arn) = description.latest_stream_arn() else {
      return Ok(None);
    };

    let raw = spec.stream_view_type().map(|v| v.as_str()).unwrap_or_default();
    let view = stream_view(raw).ok_or_else(|| {
      CapabilityError::service("dynamodb", format!("unrecognized stream view '{raw}' on {table}"))
    })?;
    Ok(Some(ChangeStream {
      arn: arn.to_string(),
      view,
      newly_enabled: false,
    }))
  }

  async fn set_stream(
    &self,
    table: &str,
    specification: StreamSpecification,
  ) -> Result<Option<String>, CapabilityError> {
    let out = self
      .client
      .update_table()
      .table_name(table)
      .stream_specification(specification)
      .send()
      .await
      .map_err(|e| sdk_error("dynamodb", e))?;

    Ok(
      out
        .table_description()
        .and_then(|d| d.latest_stream_arn())
        .map(str::to_string),
    )
  }
}

#[async_trait]
impl TableClient for DynamoTableClient {
  async fn enable_change_stream(
    &self,
    table: &str,
    view: StreamView,
  ) -> Result<ChangeStream, CapabilityError> {
    if let Some(stream) = self.current_stream(table).await? {
      debug!(
        table,
        stream_arn = %stream.arn,
        view = stream.view.as_str(),
        "change stream already enabled"
      );
      return Ok(stream);
    }

    let specification = StreamSpecification::builder()
      .stream_enabled(true)
      .stream_view_type(StreamViewType::from(view.as_str()))
      .build()
      .map_err(|e| CapabilityError::invalid_request(e.to_string()))?;

    let arn = self
      .set_stream(table, specification)
      .await?
      .ok_or_else(|| missing("dynamodb", "latest stream ARN"))?;
    Ok(ChangeStream {
      arn,
      view,
      newly_enabled: true,
    })
  }

  async fn disable_change_stream(&self, table: &str) -> Result<(), CapabilityError> {
    if self.current_stream(table).await?.is_none() {
      return Err(CapabilityError::not_found(format!(
        "change stream on table {table}"
      )));
    }

    let specification = StreamSpecification::builder()
      .stream_enabled(false)
      .build()
      .map_err(|e| CapabilityError::invalid_request(e.to_string()))?;
    self.set_stream(table, specification).await?;
    Ok(())
  }
}

/// Lazily created mutexes keyed by bucket name.
#[derive(Debug, Clone, Default)]
struct BucketLocks {
  locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl BucketLocks {
  fn get(&self, bucket: &str) -> Arc<AsyncMutex<()>> {
    self
      .locks
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(bucket.to_string())
      .or_default()
      .clone()
  }
}

/// S3-backed [`ObjectStoreClient`].
///
/// A bucket has a single notification document. Functions are added to
/// and removed from it by id, leaving queue and topic targets untouched.
///
/// Each edit reads the document, changes it and writes it back. Edits of
/// one bucket made through the same client (and its clones) are serialized.
/// S3 has no conditional write for this document, so a writer in another
/// process can still overwrite a concurrent edit.
#[derive(Debug, Clone)]
pub struct S3ObjectStoreClient {
  client: aws_sdk_s3::Client,
  locks: BucketLocks,
}

impl S3ObjectStoreClient {
  pub fn new(client: aws_sdk_s3::Client) -> Self {
    Self {
      client,
      locks: BucketLocks::default(),
    }
  }

  async fn rewrite(
    &self,
    bucket: &str,
    edit: impl FnOnce(&mut Vec<LambdaFunctionConfiguration>) -> Result<(), CapabilityError> + Send,
  ) -> Result<(), CapabilityError> {
    let lock = self.locks.get(bucket);
    let _document = lock.lock().await;

    let current = self
      .client
      .get_bucket_notification_configuration()
      .bucket(bucket)
      .send()
      .await
      .map_err(|e| sdk_error("s3", e))?;

    let mut functions = current.lambda_function_configurations().to_vec();
    edit(&mut functions)?;

    let document = NotificationConfiguration::builder()
      .set_lambda_function_configurations(Some(functions))
      .set_queue_configurations(Some(current.queue_configurations().to_vec()))
      .set_topic_configurations(Some(current.topic_configurations().to_vec()))
      .set_event_bridge_configuration(current.event_bridge_configuration().cloned())
      .build();

    self
      .client
      .put_bucket_notification_configuration()
      .bucket(bucket)
      .notification_configuration(document)
      .send()
      .await
      .map_err(|e| sdk_error("s3", e))?;
    Ok(())
  }
}

#[async_trait]
impl ObjectStoreClient for S3ObjectStoreClient {
  async fn put_notification(
    &self,
    bucket: &str,
    config: &NotificationConfig,
  ) -> Result<(), CapabilityError> {
    let entry = LambdaFunctionConfiguration::builder()
      .id(&config.id)
      .lambda_function_arn(&config.function_arn)
      .set_events(Some(
        config
          .events
          .iter()
          .map(|e| Event::from(e.as_str()))
          .collect(),
      ))
      .build()
      .map_err(|e| CapabilityError::invalid_request(e.to_string()))?;

    let id = config.id.clone();
    self
      .rewrite(bucket, move |functions| {
        functions.retain(|f| f.id() != Some(id.as_str()));
        functions.push(entry);
        Ok(())
      })
      .await
  }

  async fn remove_notification(&self, bucket: &str, id: &str) -> Result<(), CapabilityError> {
    let id = id.to_string();
    self
      .rewrite(bucket, move |functions| {
        let before = functions.len();
        functions.retain(|f| f.id() != Some(id.as_str()));
        if functions.len() == before {
          return Err(CapabilityError::not_found(format!("notification {id}")));
        }
        Ok(())
      })
      .await
  }
}
