use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::workflows::analysis::client::{
    AnalysisClientError, AnalysisGateway, AnalysisHandle, DocumentFields, SubmissionRequest,
};
use crate::workflows::analysis::domain::UploadDocument;

/// In-memory gateway whose behavior the tests script call by call: submissions and
/// fetches are recorded, either call can be made to fail, and optional gates park a
/// call until the test releases it so intermediate states can be observed.
#[derive(Default)]
pub(super) struct ScriptedGateway {
    pub(super) fields: Mutex<DocumentFields>,
    pub(super) fail_submit: AtomicBool,
    pub(super) submit_without_id: AtomicBool,
    pub(super) fail_fetch: AtomicBool,
    pub(super) hold_submit: Mutex<Option<Arc<Notify>>>,
    pub(super) hold_fetch: Mutex<Option<Arc<Notify>>>,
    pub(super) submissions: Mutex<Vec<SubmissionRequest>>,
    pub(super) fetched: Mutex<Vec<AnalysisHandle>>,
}

impl ScriptedGateway {
    pub(super) fn with_fields(pairs: &[(&str, &str)]) -> Self {
        let gateway = Self::default();
        *gateway.fields.lock().expect("fields mutex poisoned") = DocumentFields(
            pairs
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect(),
        );
        gateway
    }

    pub(super) fn gate_submit(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold_submit.lock().expect("gate mutex poisoned") = Some(gate.clone());
        gate
    }

    pub(super) fn gate_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold_fetch.lock().expect("gate mutex poisoned") = Some(gate.clone());
        gate
    }

    pub(super) fn submission_count(&self) -> usize {
        self.submissions.lock().expect("submissions mutex poisoned").len()
    }

    pub(super) fn fetch_count(&self) -> usize {
        self.fetched.lock().expect("fetched mutex poisoned").len()
    }

    pub(super) fn last_submission(&self) -> Option<SubmissionRequest> {
        self.submissions
            .lock()
            .expect("submissions mutex poisoned")
            .last()
            .cloned()
    }
}

#[async_trait]
impl AnalysisGateway for ScriptedGateway {
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<AnalysisHandle, AnalysisClientError> {
        let count = {
            let mut submissions = self.submissions.lock().expect("submissions mutex poisoned");
            submissions.push(request.clone());
            submissions.len()
        };

        let gate = self.hold_submit.lock().expect("gate mutex poisoned").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_submit.load(Ordering::Relaxed) {
            return Err(AnalysisClientError::Transport("connection refused".to_string()));
        }
        if self.submit_without_id.load(Ordering::Relaxed) {
            return Err(AnalysisClientError::MissingCorrelationId);
        }
        Ok(AnalysisHandle(format!("req-{count}")))
    }

    async fn fetch_result(
        &self,
        handle: &AnalysisHandle,
    ) -> Result<DocumentFields, AnalysisClientError> {
        self.fetched
            .lock()
            .expect("fetched mutex poisoned")
            .push(handle.clone());

        let gate = self.hold_fetch.lock().expect("gate mutex poisoned").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_fetch.load(Ordering::Relaxed) {
            return Err(AnalysisClientError::Status { status: 404 });
        }
        Ok(self.fields.lock().expect("fields mutex poisoned").clone())
    }
}

pub(super) fn policy_scan(filename: &str) -> UploadDocument {
    UploadDocument {
        filename: filename.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xff, 0xd8, 0xff, 0xe0, 0x10],
    }
}
