use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Failures turning an uploaded file into (or back out of) the transport encoding.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("uploaded document is empty")]
    EmptyDocument,
    #[error("document payload is not valid base64: {0}")]
    Malformed(#[from] base64::DecodeError),
}

/// Encode raw file bytes into the text-safe form the remote service expects in its
/// `base64Source` body field. Empty input is rejected before any network traffic.
pub fn encode_document(bytes: &[u8]) -> Result<String, EncodingError> {
    if bytes.is_empty() {
        return Err(EncodingError::EmptyDocument);
    }
    Ok(STANDARD.encode(bytes))
}

/// Exact inverse of [`encode_document`].
pub fn decode_document(text: &str) -> Result<Vec<u8>, EncodingError> {
    Ok(STANDARD.decode(text)?)
}
