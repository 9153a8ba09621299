use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::config::AnalysisConfig;

/// Everything needed for one analyze call. Built once per upload and immutable after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub base64_source: String,
    pub query_fields: String,
}

/// Opaque correlation identifier handed back by the submit call; redeemed exactly once
/// against the result endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisHandle(pub String);

impl fmt::Display for AnalysisHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracted field values in the order the service reported them. A field the service
/// knew about but could not extract carries an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFields(pub Vec<(String, String)>);

/// Error enumeration for the two remote calls. `Transport` and `Status` are failures of
/// the network/HTTP layer; the remaining variants are well-formed responses missing what
/// the protocol promised.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisClientError {
    #[error("analysis service unreachable: {0}")]
    Transport(String),
    #[error("analysis service answered HTTP {status}")]
    Status { status: u16 },
    #[error("could not start analysis: submission returned no correlation id")]
    MissingCorrelationId,
    #[error("analysis result missing expected payload: {0}")]
    MalformedResult(String),
}

impl AnalysisClientError {
    /// True for protocol-shaped failures (spec'd fields absent from a readable
    /// response), false for plain transport/HTTP failures.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            AnalysisClientError::MissingCorrelationId | AnalysisClientError::MalformedResult(_)
        )
    }
}

/// Seam over the remote document-understanding service so the workflow can be exercised
/// against in-memory fakes.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<AnalysisHandle, AnalysisClientError>;

    async fn fetch_result(
        &self,
        handle: &AnalysisHandle,
    ) -> Result<DocumentFields, AnalysisClientError>;
}

const CORRELATION_HEADER: &str = "apim-request-id";
const SUBSCRIPTION_HEADER: &str = "Ocp-Apim-Subscription-Key";
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for the hosted document-intelligence API.
pub struct DocumentIntelligenceClient {
    http: reqwest::Client,
    config: AnalysisConfig,
}

impl DocumentIntelligenceClient {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisClientError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| AnalysisClientError::Transport(err.to_string()))?;
        Ok(Self { http, config })
    }

    fn result_url(&self, handle: &AnalysisHandle) -> String {
        format!("{}/{}", self.config.result_url.trim_end_matches('/'), handle)
    }
}

impl fmt::Debug for DocumentIntelligenceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentIntelligenceClient")
            .field("analyze_url", &self.config.analyze_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody<'a> {
    base64_source: &'a str,
}

#[async_trait]
impl AnalysisGateway for DocumentIntelligenceClient {
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<AnalysisHandle, AnalysisClientError> {
        let response = self
            .http
            .post(&self.config.analyze_url)
            .query(&[
                ("api-version", self.config.api_version.as_str()),
                ("stringIndexType", "utf16CodeUnit"),
                ("queryFields", request.query_fields.as_str()),
                ("features", "queryFields"),
            ])
            .header(SUBSCRIPTION_HEADER, &self.config.subscription_key)
            .json(&AnalyzeBody {
                base64_source: &request.base64_source,
            })
            .send()
            .await
            .map_err(|err| AnalysisClientError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisClientError::Status {
                status: status.as_u16(),
            });
        }

        let correlation_id = response
            .headers()
            .get(CORRELATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(AnalysisClientError::MissingCorrelationId)?;

        debug!(%correlation_id, "analysis submission accepted");
        Ok(AnalysisHandle(correlation_id.to_string()))
    }

    async fn fetch_result(
        &self,
        handle: &AnalysisHandle,
    ) -> Result<DocumentFields, AnalysisClientError> {
        let response = self
            .http
            .get(self.result_url(handle))
            .query(&[("api-version", self.config.api_version.as_str())])
            .header(SUBSCRIPTION_HEADER, &self.config.subscription_key)
            .send()
            .await
            .map_err(|err| AnalysisClientError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisClientError::Status {
                status: status.as_u16(),
            });
        }

        let envelope: ResultEnvelope = response
            .json()
            .await
            .map_err(|err| AnalysisClientError::MalformedResult(err.to_string()))?;

        envelope.into_fields()
    }
}

/// Wire shape of the result endpoint. Only `analyzeResult.documents[0].fields` matters
/// to the workflow; anything less is a protocol failure, including results that have
/// not finished cooking.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    analyze_result: Option<AnalyzeResultBody>,
}

impl ResultEnvelope {
    fn into_fields(self) -> Result<DocumentFields, AnalysisClientError> {
        let document = self
            .analyze_result
            .and_then(|body| body.documents.into_iter().next());

        match document {
            Some(document) => Ok(DocumentFields(
                document
                    .fields
                    .into_iter()
                    .map(|(name, payload)| (name, payload.value_string.unwrap_or_default()))
                    .collect(),
            )),
            None => match self.status.as_deref() {
                Some(status) if status != "succeeded" => Err(
                    AnalysisClientError::MalformedResult(format!(
                        "analysis is '{status}', no document available"
                    )),
                ),
                _ => Err(AnalysisClientError::MalformedResult(
                    "no analyzed document in response".to_string(),
                )),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeResultBody {
    #[serde(default)]
    documents: Vec<AnalyzedDocument>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedDocument {
    #[serde(default, deserialize_with = "deserialize_ordered_fields")]
    fields: Vec<(String, FieldPayload)>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldPayload {
    #[serde(default)]
    value_string: Option<String>,
}

/// Keep the service's field order instead of funneling the map through a sorted
/// collection; the display layer shows fields exactly as reported.
fn deserialize_ordered_fields<'de, D>(
    deserializer: D,
) -> Result<Vec<(String, FieldPayload)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedFields;

    impl<'de> serde::de::Visitor<'de> for OrderedFields {
        type Value = Vec<(String, FieldPayload)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of field name to field payload")
        }

        fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
        where
            M: serde::de::MapAccess<'de>,
        {
            let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(entry) = access.next_entry::<String, FieldPayload>()? {
                fields.push(entry);
            }
            Ok(fields)
        }
    }

    deserializer.deserialize_map(OrderedFields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_preserves_field_order_and_defaults_missing_values() {
        let raw = r#"{
            "status": "succeeded",
            "analyzeResult": {
                "documents": [
                    {
                        "fields": {
                            "numero_da_apolice": { "valueString": "123" },
                            "cnpj": { "valueString": "" },
                            "validade": {}
                        }
                    }
                ]
            }
        }"#;

        let envelope: ResultEnvelope = serde_json::from_str(raw).expect("envelope parses");
        let fields = envelope.into_fields().expect("fields extracted");
        assert_eq!(
            fields.0,
            vec![
                ("numero_da_apolice".to_string(), "123".to_string()),
                ("cnpj".to_string(), String::new()),
                ("validade".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn envelope_without_documents_is_a_protocol_failure() {
        let raw = r#"{ "status": "running" }"#;
        let envelope: ResultEnvelope = serde_json::from_str(raw).expect("envelope parses");
        match envelope.into_fields() {
            Err(AnalysisClientError::MalformedResult(message)) => {
                assert!(message.contains("running"));
            }
            other => panic!("expected malformed result, got {other:?}"),
        }
    }

    #[test]
    fn protocol_classification_covers_both_shapes() {
        assert!(AnalysisClientError::MissingCorrelationId.is_protocol());
        assert!(AnalysisClientError::MalformedResult("x".into()).is_protocol());
        assert!(!AnalysisClientError::Transport("x".into()).is_protocol());
        assert!(!AnalysisClientError::Status { status: 500 }.is_protocol());
    }
}
