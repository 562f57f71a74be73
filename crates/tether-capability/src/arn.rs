//! Amazon Resource Name parsing.

use std::fmt;
use std::str::FromStr;

/// A parsed `arn:partition:service:region:account:resource` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
  pub partition: String,
  pub service: String,
  pub region: String,
  pub account_id: String,
  pub resource: String,
}

/// Error returned for strings that are not ARNs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed arn '{0}'")]
pub struct ArnError(pub String);

impl Arn {
  pub fn new(
    partition: impl Into<String>,
    service: impl Into<String>,
    region: impl Into<String>,
    account_id: impl Into<String>,
    resource: impl Into<String>,
  ) -> Self {
    Self {
      partition: partition.into(),
      service: service.into(),
      region: region.into(),
      account_id: account_id.into(),
      resource: resource.into(),
    }
  }

  /// The part of the resource after the first `/` or `:` separator,
  /// e.g. `orders` for `table/orders`.
  pub fn resource_name(&self) -> &str {
    match self.resource.find(['/', ':']) {
      Some(idx) => &self.resource[idx + 1..],
      None => &self.resource,
    }
  }

  /// The resource type prefix, e.g. `table` for `table/orders`.
  pub fn resource_type(&self) -> Option<&str> {
    self
      .resource
      .find(['/', ':'])
      .map(|idx| &self.resource[..idx])
  }
}

impl FromStr for Arn {
  type Err = ArnError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut parts = s.splitn(6, ':');
    let (Some("arn"), Some(partition), Some(service), Some(region), Some(account), Some(resource)) = (
      parts.next(),
      parts.next(),
      parts.next(),
      parts.next(),
      parts.next(),
      parts.next(),
    ) else {
      return Err(ArnError(s.to_string()));
    };

    if partition.is_empty() || service.is_empty() || resource.is_empty() {
      return Err(ArnError(s.to_string()));
    }

    Ok(Arn::new(partition, service, region, account, resource))
  }
}

impl fmt::Display for Arn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "arn:{}:{}:{}:{}:{}",
      self.partition, self.service, self.region, self.account_id, self.resource
    )
  }
}
