use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Item kind recorded for function deployments.
pub const FUNCTION_KIND: &str = "function";

const CREATED_AT_FORMAT: &str = "%Y%m%d%H%M%S";

/// One registry entry: a deployment and its bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryItem {
  pub id: String,

  #[serde(rename = "type")]
  pub kind: String,

  #[serde(with = "compact_timestamp")]
  pub created_at: DateTime<Utc>,

  /// Serialized trigger bindings. Each carries at least its `kind` and
  /// `createdIds`.
  #[serde(default)]
  pub triggers: Vec<serde_json::Value>,
}

impl RegistryItem {
  pub fn function(id: impl Into<String>, triggers: Vec<serde_json::Value>) -> Self {
    Self {
      id: id.into(),
      kind: FUNCTION_KIND.to_string(),
      created_at: Utc::now(),
      triggers,
    }
  }

  /// `created_at` as stored, e.g. `20240131235959`.
  pub fn created_at_compact(&self) -> String {
    self.created_at.format(CREATED_AT_FORMAT).to_string()
  }

  pub fn parse_created_at(value: &str) -> Result<DateTime<Utc>, RegistryError> {
    NaiveDateTime::parse_from_str(value, CREATED_AT_FORMAT)
      .map(|naive| naive.and_utc())
      .map_err(|e| RegistryError::Backend {
        message: format!("invalid created_at '{value}': {e}"),
      })
  }
}

mod compact_timestamp {
  use chrono::{DateTime, NaiveDateTime, Utc};
  use serde::{Deserialize, Deserializer, Serializer};

  use super::CREATED_AT_FORMAT;

  pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.format(CREATED_AT_FORMAT).to_string())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    NaiveDateTime::parse_from_str(&raw, CREATED_AT_FORMAT)
      .map(|naive| naive.and_utc())
      .map_err(serde::de::Error::custom)
  }
}
