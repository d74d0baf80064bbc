//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::CmdsageError;

/// Wrap a future with a hard timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, CmdsageError>>,
) -> Result<T, CmdsageError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(CmdsageError::Timeout(duration.as_millis() as u64)),
    }
}
