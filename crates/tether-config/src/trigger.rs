use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four kinds of trigger source a function can be wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
  Schedule,
  Route,
  Subscription,
  Datastore,
}

impl TriggerKind {
  pub const ALL: [TriggerKind; 4] = [
    TriggerKind::Schedule,
    TriggerKind::Route,
    TriggerKind::Subscription,
    TriggerKind::Datastore,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      TriggerKind::Schedule => "schedule",
      TriggerKind::Route => "route",
      TriggerKind::Subscription => "subscription",
      TriggerKind::Datastore => "datastore",
    }
  }
}

impl fmt::Display for TriggerKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A timer rule carrying a cron or rate expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTrigger {
  /// e.g. "rate(5 minutes)" or "cron(0 12 * * ? *)"
  #[serde(alias = "cron")]
  pub expression: String,
}

/// An HTTP route on an existing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTrigger {
  pub api_id: String,

  /// Exact resource path, e.g. "/items".
  #[serde(alias = "route")]
  pub path: String,

  pub method: HttpMethod,

  #[serde(default = "default_content_type")]
  pub content_type: String,
}

/// A publish/subscribe topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTrigger {
  #[serde(alias = "publisher_id")]
  pub topic_id: String,

  /// Route deliveries through an intermediate queue.
  #[serde(default = "default_buffered")]
  pub buffered: bool,
}

/// A datastore change feed (table stream or object-store notifications).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreTrigger {
  pub datastore_id: String,
}

/// A single trigger declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSpec {
  Schedule(ScheduleTrigger),
  Route(RouteTrigger),
  Subscription(SubscriptionTrigger),
  Datastore(DatastoreTrigger),
}

impl TriggerSpec {
  pub fn kind(&self) -> TriggerKind {
    match self {
      TriggerSpec::Schedule(_) => TriggerKind::Schedule,
      TriggerSpec::Route(_) => TriggerKind::Route,
      TriggerSpec::Subscription(_) => TriggerKind::Subscription,
      TriggerSpec::Datastore(_) => TriggerKind::Datastore,
    }
  }
}

/// The triggers declared for one function, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerSet {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub schedule: Option<ScheduleTrigger>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub route: Option<RouteTrigger>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subscription: Option<SubscriptionTrigger>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub datastore: Option<DatastoreTrigger>,
}

impl TriggerSet {
  pub fn is_empty(&self) -> bool {
    self.specs().is_empty()
  }

  /// The declared spec for one kind.
  pub fn get(&self, kind: TriggerKind) -> Option<TriggerSpec> {
    match kind {
      TriggerKind::Schedule => self.schedule.clone().map(TriggerSpec::Schedule),
      TriggerKind::Route => self.route.clone().map(TriggerSpec::Route),
      TriggerKind::Subscription => self.subscription.clone().map(TriggerSpec::Subscription),
      TriggerKind::Datastore => self.datastore.clone().map(TriggerSpec::Datastore),
    }
  }

  /// All declared specs, in kind order.
  pub fn specs(&self) -> Vec<TriggerSpec> {
    TriggerKind::ALL
      .iter()
      .filter_map(|kind| self.get(*kind))
      .collect()
  }

  /// Add a spec, replacing any previous spec of the same kind.
  pub fn insert(&mut self, spec: TriggerSpec) {
    match spec {
      TriggerSpec::Schedule(s) => self.schedule = Some(s),
      TriggerSpec::Route(r) => self.route = Some(r),
      TriggerSpec::Subscription(s) => self.subscription = Some(s),
      TriggerSpec::Datastore(d) => self.datastore = Some(d),
    }
  }
}

impl FromIterator<TriggerSpec> for TriggerSet {
  fn from_iter<I: IntoIterator<Item = TriggerSpec>>(iter: I) -> Self {
    let mut set = TriggerSet::default();
    for spec in iter {
      set.insert(spec);
    }
    set
  }
}

/// HTTP methods a route trigger may bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
  Get,
  Post,
  Put,
  Delete,
  Patch,
}

impl HttpMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      HttpMethod::Get => "GET",
      HttpMethod::Post => "POST",
      HttpMethod::Put => "PUT",
      HttpMethod::Delete => "DELETE",
      HttpMethod::Patch => "PATCH",
    }
  }
}

impl fmt::Display for HttpMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Error returned when parsing an unsupported HTTP method.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported http method '{0}' (expected get, post, put, delete or patch)")]
pub struct InvalidMethod(pub String);

impl FromStr for HttpMethod {
  type Err = InvalidMethod;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "get" => Ok(HttpMethod::Get),
      "post" => Ok(HttpMethod::Post),
      "put" => Ok(HttpMethod::Put),
      "delete" => Ok(HttpMethod::Delete),
      "patch" => Ok(HttpMethod::Patch),
      _ => Err(InvalidMethod(s.to_string())),
    }
  }
}

impl TryFrom<String> for HttpMethod {
  type Error = InvalidMethod;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<HttpMethod> for String {
  fn from(method: HttpMethod) -> Self {
    method.as_str().to_string()
  }
}

fn default_content_type() -> String {
  "application/json".to_string()
}

fn default_buffered() -> bool {
  true
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_trigger_spec_is_tagged_by_kind() {
    let spec: TriggerSpec = serde_json::from_str(
      r#"{"kind": "route", "api_id": "a1b2", "path": "/items", "method": "post"}"#,
    )
    .unwrap();

    let TriggerSpec::Route(route) = spec else {
      panic!("expected route spec");
    };
    assert_eq!(route.method, HttpMethod::Post);
    assert_eq!(route.content_type, "application/json");
  }

  #[test]
  fn test_legacy_field_aliases() {
    let set: TriggerSet = serde_json::from_str(
      r#"{
        "schedule": {"cron": "rate(1 hour)"},
        "route": {"api_id": "a1b2", "route": "/health", "method": "GET"},
        "subscription": {"publisher_id": "arn:aws:sns:us-east-1:123456789012:orders"}
      }"#,
    )
    .unwrap();

    assert_eq!(set.schedule.unwrap().expression, "rate(1 hour)");
    assert_eq!(set.route.unwrap().path, "/health");
    let subscription = set.subscription.unwrap();
    assert_eq!(subscription.topic_id, "arn:aws:sns:us-east-1:123456789012:orders");
    assert!(subscription.buffered);
  }

  #[test]
  fn test_invalid_method_rejected() {
    let result: Result<TriggerSpec, _> = serde_json::from_str(
      r#"{"kind": "route", "api_id": "a1b2", "path": "/items", "method": "options"}"#,
    );
    assert!(result.is_err());
    assert_eq!(
      "OPTIONS".parse::<HttpMethod>(),
      Err(InvalidMethod("OPTIONS".to_string()))
    );
  }

  #[test]
  fn test_duplicate_kind_is_unrepresentable() {
    let result: Result<TriggerSet, _> = serde_json::from_str(
      r#"{"schedule": {"expression": "rate(1 hour)"}, "schedule": {"expression": "rate(2 hours)"}}"#,
    );
    assert!(result.is_err());

    let result: Result<TriggerSet, _> =
      serde_json::from_str(r#"{"schedules": {"expression": "rate(1 hour)"}}"#);
    assert!(result.is_err());
  }

  #[test]
  fn test_set_from_specs_keeps_last_of_each_kind() {
    let set: TriggerSet = vec![
      TriggerSpec::Schedule(ScheduleTrigger {
        expression: "rate(1 hour)".to_string(),
      }),
      TriggerSpec::Datastore(DatastoreTrigger {
        datastore_id: "arn:aws:s3:::uploads".to_string(),
      }),
      TriggerSpec::Schedule(ScheduleTrigger {
        expression: "rate(5 minutes)".to_string(),
      }),
    ]
    .into_iter()
    .collect();

    assert_eq!(set.specs().len(), 2);
    assert_eq!(set.schedule.as_ref().unwrap().expression, "rate(5 minutes)");
    assert_eq!(set.get(TriggerKind::Route), None);
  }
}
