use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;

/// What a table change stream carries per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamView {
  NewImage,
  OldImage,
  NewAndOldImages,
  KeysOnly,
}

impl StreamView {
  pub fn as_str(&self) -> &'static str {
    match self {
      StreamView::NewImage => "NEW_IMAGE",
      StreamView::OldImage => "OLD_IMAGE",
      StreamView::NewAndOldImages => "NEW_AND_OLD_IMAGES",
      StreamView::KeysOnly => "KEYS_ONLY",
    }
  }

  /// True if each record carries the item as it is after the change.
  pub fn carries_new_image(&self) -> bool {
    matches!(self, StreamView::NewImage | StreamView::NewAndOldImages)
  }
}

/// A table's change stream as reported by [`TableClient::enable_change_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeStream {
  pub arn: String,
  pub view: StreamView,
  /// False when the stream was already enabled before the call. Such a
  /// stream belongs to someone else and must not be disabled by the caller.
  pub newly_enabled: bool,
}

/// Table change streams.
#[async_trait]
pub trait TableClient: Send + Sync {
  /// Enable the table's change stream with `view`. An already-enabled
  /// stream is left as it is and reported with its own view.
  async fn enable_change_stream(
    &self,
    table: &str,
    view: StreamView,
  ) -> Result<ChangeStream, CapabilityError>;

  async fn disable_change_stream(&self, table: &str) -> Result<(), CapabilityError>;
}

/// A function notification registered on a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
  pub id: String,
  pub function_arn: String,
  /// e.g. "s3:ObjectCreated:*"
  pub events: Vec<String>,
}

/// Object-store event notifications.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
  /// Add or replace the notification with `config.id`, keeping others.
  async fn put_notification(
    &self,
    bucket: &str,
    config: &NotificationConfig,
  ) -> Result<(), CapabilityError>;

  async fn remove_notification(&self, bucket: &str, id: &str) -> Result<(), CapabilityError>;
}
