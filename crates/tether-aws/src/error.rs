use std::error::Error;
use std::fmt;

use aws_sdk_lambda::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use tether_capability::CapabilityError;

/// Error codes meaning the addressed object does not exist.
const NOT_FOUND_CODES: &[&str] = &[
  "ResourceNotFoundException",
  "NotFoundException",
  "NotFound",
  "NoSuchBucket",
  "AWS.SimpleQueueService.NonExistentQueue",
  "QueueDoesNotExist",
];

const CONFLICT_CODES: &[&str] = &[
  "ResourceConflictException",
  "ConflictException",
  "ResourceInUseException",
  "ResourceAlreadyExistsException",
];

/// Map an SDK failure onto a [`CapabilityError`] by its service error code.
pub(crate) fn sdk_error<E, R>(service: &str, error: SdkError<E, R>) -> CapabilityError
where
  E: ProvideErrorMetadata + Error + 'static,
  R: fmt::Debug,
{
  let message = error
    .message()
    .map(str::to_string)
    .unwrap_or_else(|| DisplayErrorContext(&error).to_string());

  classify(service, error.code(), message)
}

pub(crate) fn classify(service: &str, code: Option<&str>, message: String) -> CapabilityError {
  match code {
    Some(code) if NOT_FOUND_CODES.contains(&code) => {
      CapabilityError::not_found(format!("{service} object ({message})"))
    }
    Some(code) if CONFLICT_CODES.contains(&code) => CapabilityError::conflict(message),
    Some(code) => CapabilityError::service(service, format!("{code}: {message}")),
    None => CapabilityError::service(service, message),
  }
}

/// A required field was absent from a service response.
pub(crate) fn missing(service: &str, field: &str) -> CapabilityError {
  CapabilityError::service(service, format!("response carried no {field}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_classify_by_code() {
    let gone = classify("lambda", Some("ResourceNotFoundException"), "gone".to_string());
    assert!(gone.is_not_found());

    let queue = classify("sqs", Some("QueueDoesNotExist"), String::new());
    assert!(queue.is_not_found());

    assert_eq!(
      classify("lambda", Some("ResourceConflictException"), "sid taken".to_string()),
      CapabilityError::conflict("sid taken")
    );
    assert_eq!(
      classify("events", Some("ThrottlingException"), "slow down".to_string()),
      CapabilityError::service("events", "ThrottlingException: slow down")
    );
    assert_eq!(
      classify("events", None, "dispatch failure".to_string()),
      CapabilityError::service("events", "dispatch failure")
    );
  }
}
