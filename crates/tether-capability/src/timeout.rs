use std::future::Future;
use std::time::Duration;

use crate::error::CapabilityError;

/// Bound a capability call by `limit`.
///
/// An elapsed limit is reported as [`CapabilityError::Timeout`]; the call is
/// dropped and never retried here.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, CapabilityError>
where
  F: Future<Output = Result<T, CapabilityError>>,
{
  match tokio::time::timeout(limit, call).await {
    Ok(result) => result,
    Err(_) => Err(CapabilityError::Timeout { after: limit }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_completed_call_passes_through() {
    let result = with_timeout(Duration::from_secs(1), async { Ok::<_, CapabilityError>(7) }).await;
    assert_eq!(result, Ok(7));

    let result: Result<(), _> = with_timeout(Duration::from_secs(1), async {
      Err(CapabilityError::not_found("queue"))
    })
    .await;
    assert_eq!(result, Err(CapabilityError::not_found("queue")));
  }

  #[tokio::test(start_paused = true)]
  async fn test_slow_call_times_out() {
    let result: Result<(), _> = with_timeout(Duration::from_millis(50), async {
      tokio::time::sleep(Duration::from_secs(5)).await;
      Ok(())
    })
    .await;

    assert_eq!(
      result,
      Err(CapabilityError::Timeout {
        after: Duration::from_millis(50)
      })
    );
  }
}
