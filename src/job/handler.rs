use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::Value;
use tracing::{error, warn};

use super::error::{ErrorType, JobError, JobResult};

/// Serverless job entry point.
///
/// [`handle`](JobHandler::handle) never fails: every error, including a panic
/// during dispatch, becomes the `{error: {message, type}}` envelope.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Runs one job input to its output value.
    async fn dispatch(&self, input: Value) -> JobResult<Value>;

    /// Concurrency hint reported to the job runtime.
    fn max_concurrency(&self) -> usize;

    async fn handle(&self, input: Value) -> Value {
        match AssertUnwindSafe(self.dispatch(input)).catch_unwind().await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                match e.error_type() {
                    ErrorType::InvalidRequestError => warn!(error = %e, "Rejected job"),
                    ErrorType::InternalError => error!(error = %e, "Job failed"),
                }
                e.to_envelope()
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic during dispatch".to_string());
                error!(reason = %reason, "Job panicked");
                JobError::TaskFailed { reason }.to_envelope()
            }
        }
    }
}
