//! Document classification and field-extraction workflow: tag management, intake
//! validation, submission to the remote document-understanding service, the single-shot
//! poll for its result, and the mapping into a display-ready report.

pub mod client;
pub(crate) mod controller;
pub mod domain;
pub mod encoding;
pub(crate) mod formatter;
pub(crate) mod intake;
pub(crate) mod poller;
pub mod query;
pub mod router;

#[cfg(test)]
mod tests;

pub use client::{
    AnalysisClientError, AnalysisGateway, AnalysisHandle, DocumentFields,
    DocumentIntelligenceClient, SubmissionRequest,
};
pub use controller::{AnalysisError, WorkflowController, WorkflowSnapshot};
pub use domain::{DocumentType, TagSet, UploadDocument, WorkflowState};
pub use encoding::EncodingError;
pub use formatter::{AnalysisReport, ExtractedField};
pub use intake::ValidationError;
pub use poller::PollOrchestrator;
pub use router::analysis_router;
