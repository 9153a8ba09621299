use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docfield::workflows::analysis::{
    AnalysisClientError, AnalysisGateway, AnalysisHandle, DocumentFields, DocumentType,
    SubmissionRequest,
};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory stand-in for the remote analysis service, used by the CLI demo and the
/// route tests. It answers the fetch with one sample value per requested query field,
/// leaving fields it has no sample for empty, which mirrors how the real service
/// reports fields it could not extract.
#[derive(Debug, Default)]
pub(crate) struct ScriptedAnalysisGateway {
    last_query: Mutex<Option<String>>,
}

const SAMPLE_VALUES: &[(&str, &str)] = &[
    ("CNPJ", "12.345.678/0001-90"),
    ("Número_da_Apólice", "0037.12.000123-4"),
    ("Valor_da_Apólice", "R$ 1.250,00"),
    ("Validade_da_Apólice", "31/12/2026"),
    ("Número_da_NF-e", "000.123.456"),
    ("Valor_da_Nota", "R$ 980,00"),
    ("Data_de_Emissão", "02/05/2026"),
    ("Descrição_dos_produtos_ou_serviços", "Serviços de manutenção predial"),
];

fn sample_value(token: &str) -> String {
    SAMPLE_VALUES
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, value)| (*value).to_string())
        .unwrap_or_default()
}

#[async_trait]
impl AnalysisGateway for ScriptedAnalysisGateway {
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<AnalysisHandle, AnalysisClientError> {
        *self.last_query.lock().expect("query mutex poisoned") =
            Some(request.query_fields.clone());
        Ok(AnalysisHandle("demo-0001".to_string()))
    }

    async fn fetch_result(
        &self,
        _handle: &AnalysisHandle,
    ) -> Result<DocumentFields, AnalysisClientError> {
        let query = self
            .last_query
            .lock()
            .expect("query mutex poisoned")
            .clone()
            .ok_or_else(|| {
                AnalysisClientError::MalformedResult("no submission on record".to_string())
            })?;

        Ok(DocumentFields(
            query
                .split(',')
                .filter(|token| !token.is_empty())
                .map(|token| (token.to_string(), sample_value(token)))
                .collect(),
        ))
    }
}

pub(crate) fn parse_document_type(raw: &str) -> Result<DocumentType, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "apolice" | "insurance_policy" => Ok(DocumentType::InsurancePolicy),
        "nfe" | "service_invoice" => Ok(DocumentType::ServiceInvoice),
        other => Err(format!(
            "unknown document type '{other}' (expected 'apolice' or 'nfe')"
        )),
    }
}
