use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::trigger::TriggerSet;

/// Declarative description of a deployable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
  pub name: String,

  pub code: CodeRef,

  #[serde(default)]
  pub runtime: RuntimeDescriptor,

  /// Publish a new version on create/update.
  #[serde(default = "default_publish")]
  pub publish: bool,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub environment: BTreeMap<String, String>,

  #[serde(default)]
  pub triggers: TriggerSet,
}

/// Where the function's packaged code lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CodeRef {
  /// A zip archive on the local filesystem, uploaded inline.
  ZipFile { path: PathBuf },
  /// An archive already uploaded to an object store.
  Object { bucket: String, key: String },
}

/// Runtime settings of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDescriptor {
  #[serde(default = "default_handler")]
  pub handler: String,

  #[serde(default = "default_memory_mb")]
  pub memory_mb: u32,

  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u32,

  /// Runtime tag, e.g. "python3.7".
  #[serde(default = "default_runtime")]
  pub runtime: String,
}

impl Default for RuntimeDescriptor {
  fn default() -> Self {
    Self {
      handler: default_handler(),
      memory_mb: default_memory_mb(),
      timeout_secs: default_timeout_secs(),
      runtime: default_runtime(),
    }
  }
}

fn default_publish() -> bool {
  true
}

fn default_handler() -> String {
  "function.handler".to_string()
}

fn default_memory_mb() -> u32 {
  128
}

fn default_timeout_secs() -> u32 {
  10
}

fn default_runtime() -> String {
  "python3.7".to_string()
}
