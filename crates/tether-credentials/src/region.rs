use std::sync::LazyLock;

use regex::Regex;

use crate::error::CredentialError;

static REGION_PATTERN: LazyLock<Result<Regex, regex::Error>> =
  LazyLock::new(|| Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]?)?-[a-z]+-[0-9]+$"));

/// Syntactic check of a region name such as `us-east-1` or `us-gov-west-1`.
pub fn validate_region(region: &str) -> Result<(), CredentialError> {
  let pattern = REGION_PATTERN
    .as_ref()
    .map_err(|e| CredentialError::configuration(format!("region pattern: {e}")))?;

  if pattern.is_match(region) {
    Ok(())
  } else {
    Err(CredentialError::configuration(format!(
      "invalid region '{region}'"
    )))
  }
}

/// The partition a region belongs to.
pub fn partition_for_region(region: &str) -> &'static str {
  if region.starts_with("cn-") {
    "aws-cn"
  } else if region.starts_with("us-gov-") {
    "aws-us-gov"
  } else if region.starts_with("us-iso-") {
    "aws-iso"
  } else if region.starts_with("us-isob-") {
    "aws-iso-b"
  } else {
    "aws"
  }
}
