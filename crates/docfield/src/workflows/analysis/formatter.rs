use chrono::{DateTime, Utc};
use serde::Serialize;

use super::client::DocumentFields;
use super::domain::DocumentType;

/// One display-ready label/value pair. Labels are the service's field names with
/// underscores turned back into spaces; values stay verbatim, empty string included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedField {
    pub label: String,
    pub value: String,
}

/// The display payload retained by the controller after a successful analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub document_type: DocumentType,
    pub fields: Vec<ExtractedField>,
    pub analyzed_at: DateTime<Utc>,
}

/// Map the raw field dictionary into display pairs, preserving the order the service
/// supplied. Presentation concerns beyond the label cleanup stay out of the core.
pub fn format_fields(fields: &DocumentFields) -> Vec<ExtractedField> {
    fields
        .0
        .iter()
        .map(|(name, value)| ExtractedField {
            label: name.replace('_', " "),
            value: value.clone(),
        })
        .collect()
}
