use super::domain::{TagSet, UploadDocument};

/// Validation errors raised before an upload is allowed to touch the network. All of
/// them are recoverable: the operator corrects the input and uploads again.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("another analysis is already in progress")]
    AnalysisInProgress,
    #[error("select a document type before uploading")]
    DocumentTypeMissing,
    #[error("exactly one file is allowed per upload, got {count}")]
    SingleFileRequired { count: usize },
    #[error("only image uploads are supported, got '{content_type}'")]
    UnsupportedFileType { content_type: String },
    #[error("filename '{filename}' does not look like a {label} scan (expected '{token}' in the name)")]
    FilenameMismatch {
        filename: String,
        label: &'static str,
        token: &'static str,
    },
}

/// Check an upload command against the current tag state. Returns the single accepted
/// file. Check order matches the original form: document type, file count, media type,
/// then the per-type filename convention.
pub fn validate_upload<'a>(
    tags: &TagSet,
    files: &'a [UploadDocument],
) -> Result<&'a UploadDocument, ValidationError> {
    let document_type = tags
        .document_type()
        .ok_or(ValidationError::DocumentTypeMissing)?;

    let [file] = files else {
        return Err(ValidationError::SingleFileRequired { count: files.len() });
    };

    let is_image = file
        .content_type
        .parse::<mime::Mime>()
        .map(|media| media.type_() == mime::IMAGE)
        .unwrap_or(false);
    if !is_image {
        return Err(ValidationError::UnsupportedFileType {
            content_type: file.content_type.clone(),
        });
    }

    let token = document_type.filename_token();
    if !fold_for_match(&file.filename).contains(token) {
        return Err(ValidationError::FilenameMismatch {
            filename: file.filename.clone(),
            label: document_type.label(),
            token,
        });
    }

    Ok(file)
}

/// Lowercase and strip the Latin accents that show up in Portuguese filenames so that
/// "Apólice_2024.jpg" matches the "apolice" token.
fn fold_for_match(value: &str) -> String {
    value
        .chars()
        .map(|c| match c.to_lowercase().next().unwrap_or(c) {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::analysis::domain::DocumentType;

    fn jpeg(filename: &str) -> UploadDocument {
        UploadDocument {
            filename: filename.to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0xff, 0xd8, 0xff],
        }
    }

    fn policy_tags() -> TagSet {
        let mut tags = TagSet::new();
        tags.select_document_type(DocumentType::InsurancePolicy);
        tags
    }

    #[test]
    fn accepts_a_single_matching_image() {
        let tags = policy_tags();
        let files = [jpeg("apolice_teste.jpg")];
        let accepted = validate_upload(&tags, &files).expect("upload passes");
        assert_eq!(accepted.filename, "apolice_teste.jpg");
    }

    #[test]
    fn accepts_accented_uppercase_filenames() {
        let tags = policy_tags();
        let files = [jpeg("Apólice_2024.JPG")];
        assert!(validate_upload(&tags, &files).is_ok());
    }

    #[test]
    fn rejects_when_no_document_type_selected() {
        let tags = TagSet::new();
        let files = [jpeg("apolice_teste.jpg")];
        assert!(matches!(
            validate_upload(&tags, &files),
            Err(ValidationError::DocumentTypeMissing)
        ));
    }

    #[test]
    fn rejects_more_than_one_file() {
        let tags = policy_tags();
        let files = [jpeg("apolice_a.jpg"), jpeg("apolice_b.jpg")];
        assert!(matches!(
            validate_upload(&tags, &files),
            Err(ValidationError::SingleFileRequired { count: 2 })
        ));
    }

    #[test]
    fn rejects_non_image_uploads() {
        let tags = policy_tags();
        let mut file = jpeg("apolice.pdf");
        file.content_type = "application/pdf".to_string();
        let files = [file];
        assert!(matches!(
            validate_upload(&tags, &files),
            Err(ValidationError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn rejects_filenames_missing_the_type_token() {
        let tags = policy_tags();
        let files = [jpeg("fatura.jpg")];
        assert!(matches!(
            validate_upload(&tags, &files),
            Err(ValidationError::FilenameMismatch { .. })
        ));
    }
}
