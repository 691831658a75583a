use std::{future::Future, time::Duration};

use crate::errors::DataUnavailableError;

/// Runs a single external fetch, bounded by `timeout` (if any).
/// A timeout is reported as DataUnavailableError for `subject`.
/// No retry is attempted.
pub async fn fetch_with_timeout<T, F>(
    subject: &str,
    timeout: Option<Duration>,
    fut: F,
) -> Result<T, DataUnavailableError>
where
    F: Future<Output = Result<T, DataUnavailableError>>,
{
    match timeout {
        Some(t) => match async_std::future::timeout(t, fut).await {
            Ok(res) => res,
            Err(_) => {
                tracing::debug!("fetch_with_timeout: {} timed out after {:?}", subject, t);
                Err(DataUnavailableError::new(
                    subject,
                    format!("timed out after {:.1}s", t.as_secs_f64()),
                ))
            }
        },
        None => fut.await,
    }
}
