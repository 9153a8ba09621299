use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use super::client::{AnalysisClientError, AnalysisGateway, SubmissionRequest};
use super::domain::{DocumentType, TagSet, UploadDocument, WorkflowState};
use super::encoding::{self, EncodingError};
use super::formatter::{self, AnalysisReport};
use super::intake::{self, ValidationError};
use super::poller::PollOrchestrator;
use super::query;

/// Error raised by the workflow commands. Every variant is recoverable; the controller
/// converts each into a stored user-visible message and settles back to idle, so no
/// failure ever escapes the orchestration boundary unhandled.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Client(#[from] AnalysisClientError),
    #[error("analysis cancelled by reset")]
    Cancelled,
}

/// Read-only view of the controller handed to observers: current state, tag partitions,
/// the retained report of the last successful analysis, and the last failure message.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    pub document_type: Option<DocumentType>,
    pub fixed_tags: Vec<String>,
    pub custom_tags: Vec<String>,
    pub report: Option<AnalysisReport>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct ControllerInner {
    epoch: u64,
    state: WorkflowState,
    tags: TagSet,
    report: Option<AnalysisReport>,
    last_error: Option<String>,
}

/// Composes the tag state, intake guard, poll orchestrator, and result formatter behind
/// the command surface a UI issues. At most one analysis is in flight: while the state
/// is not idle every mutating command is rejected.
///
/// All mutation happens under one mutex; the two suspension points (submit response,
/// fixed delay) run without it. Each state change is published on a watch channel, and a
/// monotonically increasing epoch lets `reset` cancel in-flight work: the pending run is
/// raced against an epoch bump and its eventual outcome is discarded if it lost.
#[derive(Debug)]
pub struct WorkflowController {
    poller: PollOrchestrator,
    inner: Mutex<ControllerInner>,
    updates: watch::Sender<WorkflowSnapshot>,
    epochs: watch::Sender<u64>,
}

impl WorkflowController {
    pub fn new(gateway: Arc<dyn AnalysisGateway>, poll_delay: Duration) -> Self {
        let inner = ControllerInner {
            epoch: 0,
            state: WorkflowState::Idle,
            tags: TagSet::new(),
            report: None,
            last_error: None,
        };
        let (updates, _) = watch::channel(Self::snapshot_of(&inner));
        let (epochs, _) = watch::channel(inner.epoch);

        Self {
            poller: PollOrchestrator::new(gateway, poll_delay),
            inner: Mutex::new(inner),
            updates,
            epochs,
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        Self::snapshot_of(&self.lock_inner())
    }

    /// Observe every state transition. The receiver always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.updates.subscribe()
    }

    pub fn select_document_type(
        &self,
        document_type: DocumentType,
    ) -> Result<(), ValidationError> {
        let mut inner = self.guarded_inner()?;
        inner.tags.select_document_type(document_type);
        self.publish(&inner);
        Ok(())
    }

    pub fn add_custom_tag(&self, name: &str) -> Result<(), ValidationError> {
        let mut inner = self.guarded_inner()?;
        inner.tags.add_custom_tag(name);
        self.publish(&inner);
        Ok(())
    }

    pub fn remove_tag(&self, name: &str) -> Result<(), ValidationError> {
        let mut inner = self.guarded_inner()?;
        inner.tags.remove_tag(name);
        self.publish(&inner);
        Ok(())
    }

    /// Valid from any state: discard tag state, the retained report, any failure
    /// message, and whatever analysis is in flight. The epoch bump both wakes the
    /// in-flight run (cancelling its pending timer or fetch) and marks any response
    /// that still arrives as stale.
    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        inner.epoch += 1;
        inner.tags.reset();
        inner.report = None;
        inner.last_error = None;
        inner.state = WorkflowState::Idle;
        self.publish(&inner);
        self.epochs.send_replace(inner.epoch);
    }

    /// Validate and encode while still idle, then drive the submit, wait, and fetch
    /// sequence, settling back to idle with either a fresh report or a recorded
    /// failure. Validation and encoding failures leave the state (and the previously
    /// retained report) untouched.
    pub async fn upload(
        &self,
        files: Vec<UploadDocument>,
    ) -> Result<AnalysisReport, AnalysisError> {
        let (request, document_type, epoch) = {
            let mut inner = self.lock_inner();
            if !inner.state.accepts_commands() {
                return Err(ValidationError::AnalysisInProgress.into());
            }

            let document = intake::validate_upload(&inner.tags, &files)?;
            let base64_source = encoding::encode_document(&document.bytes)?;
            let request = SubmissionRequest {
                base64_source,
                query_fields: query::encode_query_fields(&inner.tags),
            };
            let document_type = inner
                .tags
                .document_type()
                .expect("validated upload has a document type");

            info!(filename = %document.filename, query_fields = %request.query_fields, "starting document analysis");
            inner.state = WorkflowState::Submitting;
            inner.last_error = None;
            self.publish(&inner);
            (request, document_type, inner.epoch)
        };

        let run = self.poller.run(&request, |_| self.enter_analyzing(epoch));
        tokio::pin!(run);

        let outcome = tokio::select! {
            outcome = &mut run => outcome,
            _ = self.epoch_superseded(epoch) => {
                info!("analysis superseded by reset, discarding in-flight work");
                return Err(AnalysisError::Cancelled);
            }
        };

        match outcome {
            Ok(fields) => {
                let report = AnalysisReport {
                    document_type,
                    fields: formatter::format_fields(&fields),
                    analyzed_at: Utc::now(),
                };

                let mut inner = self.lock_inner();
                if inner.epoch != epoch {
                    return Err(AnalysisError::Cancelled);
                }
                inner.report = Some(report.clone());
                inner.last_error = None;
                inner.state = WorkflowState::Done;
                self.publish(&inner);
                inner.state = WorkflowState::Idle;
                self.publish(&inner);
                Ok(report)
            }
            Err(err) => {
                let mut inner = self.lock_inner();
                if inner.epoch == epoch {
                    warn!(error = %err, "analysis attempt failed");
                    inner.last_error = Some(err.to_string());
                    inner.state = WorkflowState::Failed;
                    self.publish(&inner);
                    inner.state = WorkflowState::Idle;
                    self.publish(&inner);
                }
                Err(AnalysisError::Client(err))
            }
        }
    }

    fn enter_analyzing(&self, epoch: u64) {
        let mut inner = self.lock_inner();
        if inner.epoch == epoch && inner.state == WorkflowState::Submitting {
            inner.state = WorkflowState::Analyzing;
            self.publish(&inner);
        }
    }

    /// Resolves once the controller epoch moves past `epoch`; never resolves otherwise.
    async fn epoch_superseded(&self, epoch: u64) {
        let mut rx = self.epochs.subscribe();
        loop {
            if *rx.borrow_and_update() != epoch {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().expect("controller mutex poisoned")
    }

    fn guarded_inner(&self) -> Result<MutexGuard<'_, ControllerInner>, ValidationError> {
        let inner = self.lock_inner();
        if inner.state.accepts_commands() {
            Ok(inner)
        } else {
            Err(ValidationError::AnalysisInProgress)
        }
    }

    fn publish(&self, inner: &ControllerInner) {
        self.updates.send_replace(Self::snapshot_of(inner));
    }

    fn snapshot_of(inner: &ControllerInner) -> WorkflowSnapshot {
        WorkflowSnapshot {
            state: inner.state,
            document_type: inner.tags.document_type(),
            fixed_tags: inner.tags.fixed().to_vec(),
            custom_tags: inner.tags.custom().to_vec(),
            report: inner.report.clone(),
            last_error: inner.last_error.clone(),
        }
    }
}
