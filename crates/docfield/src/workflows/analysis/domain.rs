use serde::{Deserialize, Serialize};

/// Kinds of scanned documents the extraction workflow understands. The chosen type
/// drives both the mandatory field set and the filename naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    InsurancePolicy,
    ServiceInvoice,
}

impl DocumentType {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::InsurancePolicy => "Apólice",
            DocumentType::ServiceInvoice => "NF-e",
        }
    }

    /// Field names every extraction for this type must request. Not user-removable.
    pub const fn fixed_tags(self) -> &'static [&'static str] {
        match self {
            DocumentType::InsurancePolicy => &[
                "CNPJ",
                "Número da Apólice",
                "Valor da Apólice",
                "Validade da Apólice",
            ],
            DocumentType::ServiceInvoice => &[
                "CNPJ",
                "Número da NF-e",
                "Valor da Nota",
                "Data de Emissão",
                "Descrição dos produtos ou serviços",
            ],
        }
    }

    /// Token that must appear in an uploaded filename for it to plausibly be a scan of
    /// this document type. Matching is case-insensitive and accent-folded.
    pub const fn filename_token(self) -> &'static str {
        match self {
            DocumentType::InsurancePolicy => "apolice",
            DocumentType::ServiceInvoice => "nfe",
        }
    }
}

/// The set of field names to extract: a fixed block mandated by the selected
/// [`DocumentType`] plus user-added custom names. Invariant: the fixed and custom
/// partitions never share a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    document_type: Option<DocumentType>,
    fixed: Vec<String>,
    custom: Vec<String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the fixed block with the canonical list for `document_type` and drop all
    /// custom tags. Always succeeds.
    pub fn select_document_type(&mut self, document_type: DocumentType) {
        self.document_type = Some(document_type);
        self.fixed = document_type
            .fixed_tags()
            .iter()
            .map(|tag| (*tag).to_string())
            .collect();
        self.custom.clear();
    }

    /// Append a custom tag. Empty or whitespace-only names and names already present in
    /// either partition are silently ignored, keeping the add idempotent.
    pub fn add_custom_tag(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() || self.contains(name) {
            return;
        }
        self.custom.push(name.to_string());
    }

    /// Remove a custom tag. Fixed tags are silently protected while a document type is
    /// selected.
    pub fn remove_tag(&mut self, name: &str) {
        self.custom.retain(|tag| tag != name);
    }

    pub fn reset(&mut self) {
        self.document_type = None;
        self.fixed.clear();
        self.custom.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fixed.iter().any(|tag| tag == name) || self.custom.iter().any(|tag| tag == name)
    }

    pub fn document_type(&self) -> Option<DocumentType> {
        self.document_type
    }

    pub fn fixed(&self) -> &[String] {
        &self.fixed
    }

    pub fn custom(&self) -> &[String] {
        &self.custom
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty() && self.custom.is_empty()
    }

    /// All tag names in query order: fixed block first, then custom, both in insertion
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fixed
            .iter()
            .chain(self.custom.iter())
            .map(String::as_str)
    }
}

/// Lifecycle of a single analysis attempt. `Done` and `Failed` are announced to
/// observers but the controller always comes to rest at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Submitting,
    Analyzing,
    Done,
    Failed,
}

impl WorkflowState {
    pub const fn label(self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Submitting => "submitting",
            WorkflowState::Analyzing => "analyzing",
            WorkflowState::Done => "done",
            WorkflowState::Failed => "failed",
        }
    }

    pub const fn accepts_commands(self) -> bool {
        matches!(self, WorkflowState::Idle)
    }
}

/// One candidate file of an upload command, as handed over by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDocument {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selecting_a_type_installs_its_fixed_tags() {
        let mut tags = TagSet::new();
        tags.select_document_type(DocumentType::InsurancePolicy);
        assert_eq!(tags.fixed().len(), 4);
        assert!(tags.contains("Número da Apólice"));
        assert!(tags.custom().is_empty());
    }

    #[test]
    fn switching_types_replaces_fixed_and_clears_custom() {
        let mut tags = TagSet::new();
        tags.select_document_type(DocumentType::InsurancePolicy);
        tags.add_custom_tag("Corretor");
        tags.select_document_type(DocumentType::ServiceInvoice);

        let expected: Vec<String> = DocumentType::ServiceInvoice
            .fixed_tags()
            .iter()
            .map(|tag| (*tag).to_string())
            .collect();
        assert_eq!(tags.fixed(), expected.as_slice());
        assert!(tags.custom().is_empty());
    }

    #[test]
    fn add_custom_tag_is_idempotent() {
        let mut tags = TagSet::new();
        tags.select_document_type(DocumentType::InsurancePolicy);
        tags.add_custom_tag("Corretor");
        tags.add_custom_tag("Corretor");
        assert_eq!(tags.custom(), ["Corretor".to_string()].as_slice());
    }

    #[test]
    fn add_custom_tag_ignores_blank_and_fixed_names() {
        let mut tags = TagSet::new();
        tags.select_document_type(DocumentType::InsurancePolicy);
        tags.add_custom_tag("   ");
        tags.add_custom_tag("CNPJ");
        assert!(tags.custom().is_empty());
    }

    #[test]
    fn remove_tag_never_touches_fixed_tags() {
        let mut tags = TagSet::new();
        tags.select_document_type(DocumentType::InsurancePolicy);
        tags.add_custom_tag("Corretor");
        tags.remove_tag("CNPJ");
        tags.remove_tag("Corretor");
        assert_eq!(tags.fixed().len(), 4);
        assert!(tags.custom().is_empty());
    }

    #[test]
    fn reset_clears_type_and_both_partitions() {
        let mut tags = TagSet::new();
        tags.select_document_type(DocumentType::ServiceInvoice);
        tags.add_custom_tag("Transportadora");
        tags.reset();
        assert!(tags.document_type().is_none());
        assert!(tags.is_empty());
    }
}
