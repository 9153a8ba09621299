use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::client::{AnalysisClientError, AnalysisGateway, AnalysisHandle, DocumentFields, SubmissionRequest};

/// Drives one submit, wait, fetch-result sequence against the gateway. The wait is a
/// single fixed delay and the fetch happens exactly once; any failure along the way is
/// terminal for the attempt. Cancellation works by dropping the returned future.
pub struct PollOrchestrator {
    gateway: Arc<dyn AnalysisGateway>,
    poll_delay: Duration,
}

impl PollOrchestrator {
    pub fn new(gateway: Arc<dyn AnalysisGateway>, poll_delay: Duration) -> Self {
        Self { gateway, poll_delay }
    }

    pub fn poll_delay(&self) -> Duration {
        self.poll_delay
    }

    /// Run the full sequence. `on_submitted` fires as soon as the correlation handle
    /// arrives, before the delay starts, so callers can surface progress.
    pub async fn run<F>(
        &self,
        request: &SubmissionRequest,
        mut on_submitted: F,
    ) -> Result<DocumentFields, AnalysisClientError>
    where
        F: FnMut(&AnalysisHandle),
    {
        let handle = self.gateway.submit(request).await?;
        info!(correlation_id = %handle, delay_ms = self.poll_delay.as_millis() as u64, "analysis submitted, waiting for result");
        on_submitted(&handle);

        tokio::time::sleep(self.poll_delay).await;

        let fields = self.gateway.fetch_result(&handle).await?;
        info!(correlation_id = %handle, fields = fields.0.len(), "analysis result received");
        Ok(fields)
    }
}

impl std::fmt::Debug for PollOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollOrchestrator")
            .field("poll_delay", &self.poll_delay)
            .finish_non_exhaustive()
    }
}
