use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::client::AnalysisClientError;
use super::controller::{AnalysisError, WorkflowController};
use super::domain::{DocumentType, UploadDocument};
use super::encoding;
use super::intake::ValidationError;

/// Router builder exposing the workflow command surface over HTTP.
pub fn analysis_router(controller: Arc<WorkflowController>) -> Router {
    Router::new()
        .route("/api/v1/analysis/document-type", post(select_type_handler))
        .route("/api/v1/analysis/tags", post(add_tag_handler))
        .route("/api/v1/analysis/tags/:name", delete(remove_tag_handler))
        .route("/api/v1/analysis/upload", post(upload_handler))
        .route("/api/v1/analysis/reset", post(reset_handler))
        .route("/api/v1/analysis/state", get(state_handler))
        .with_state(controller)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SelectTypeRequest {
    pub(crate) document_type: DocumentType,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddTagRequest {
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadRequest {
    pub(crate) files: Vec<UploadFilePayload>,
}

/// One file of an upload command. `content` is base64 so the surface stays JSON; it is
/// decoded here and re-encoded by the document encoder on the way out.
#[derive(Debug, Deserialize)]
pub(crate) struct UploadFilePayload {
    pub(crate) filename: String,
    pub(crate) content_type: String,
    pub(crate) content: String,
}

pub(crate) async fn select_type_handler(
    State(controller): State<Arc<WorkflowController>>,
    axum::Json(request): axum::Json<SelectTypeRequest>,
) -> Response {
    match controller.select_document_type(request.document_type) {
        Ok(()) => snapshot_response(&controller),
        Err(err) => validation_response(err),
    }
}

pub(crate) async fn add_tag_handler(
    State(controller): State<Arc<WorkflowController>>,
    axum::Json(request): axum::Json<AddTagRequest>,
) -> Response {
    match controller.add_custom_tag(&request.name) {
        Ok(()) => snapshot_response(&controller),
        Err(err) => validation_response(err),
    }
}

pub(crate) async fn remove_tag_handler(
    State(controller): State<Arc<WorkflowController>>,
    Path(name): Path<String>,
) -> Response {
    match controller.remove_tag(&name) {
        Ok(()) => snapshot_response(&controller),
        Err(err) => validation_response(err),
    }
}

pub(crate) async fn upload_handler(
    State(controller): State<Arc<WorkflowController>>,
    axum::Json(request): axum::Json<UploadRequest>,
) -> Response {
    let mut files = Vec::with_capacity(request.files.len());
    for payload in request.files {
        match encoding::decode_document(&payload.content) {
            Ok(bytes) => files.push(UploadDocument {
                filename: payload.filename,
                content_type: payload.content_type,
                bytes,
            }),
            Err(err) => {
                let body = json!({ "error": err.to_string() });
                return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(body)).into_response();
            }
        }
    }

    match controller.upload(files).await {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => analysis_error_response(err),
    }
}

pub(crate) async fn reset_handler(
    State(controller): State<Arc<WorkflowController>>,
) -> Response {
    controller.reset();
    snapshot_response(&controller)
}

pub(crate) async fn state_handler(
    State(controller): State<Arc<WorkflowController>>,
) -> Response {
    snapshot_response(&controller)
}

fn snapshot_response(controller: &WorkflowController) -> Response {
    (StatusCode::OK, axum::Json(controller.snapshot())).into_response()
}

fn validation_response(err: ValidationError) -> Response {
    let status = match err {
        ValidationError::AnalysisInProgress => StatusCode::CONFLICT,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    let body = json!({ "error": err.to_string() });
    (status, axum::Json(body)).into_response()
}

fn analysis_error_response(err: AnalysisError) -> Response {
    let status = match &err {
        AnalysisError::Validation(ValidationError::AnalysisInProgress) => StatusCode::CONFLICT,
        AnalysisError::Validation(_) | AnalysisError::Encoding(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AnalysisError::Client(AnalysisClientError::Transport(_))
        | AnalysisError::Client(AnalysisClientError::Status { .. })
        | AnalysisError::Client(AnalysisClientError::MissingCorrelationId)
        | AnalysisError::Client(AnalysisClientError::MalformedResult(_)) => {
            StatusCode::BAD_GATEWAY
        }
        AnalysisError::Cancelled => StatusCode::CONFLICT,
    };
    let body = json!({ "error": err.to_string() });
    (status, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::workflows::analysis::client::{
        AnalysisGateway, AnalysisHandle, DocumentFields, SubmissionRequest,
    };

    struct CannedGateway;

    #[async_trait]
    impl AnalysisGateway for CannedGateway {
        async fn submit(
            &self,
            _request: &SubmissionRequest,
        ) -> Result<AnalysisHandle, AnalysisClientError> {
            Ok(AnalysisHandle("req-1".to_string()))
        }

        async fn fetch_result(
            &self,
            _handle: &AnalysisHandle,
        ) -> Result<DocumentFields, AnalysisClientError> {
            Ok(DocumentFields(vec![(
                "numero_da_apolice".to_string(),
                "42".to_string(),
            )]))
        }
    }

    fn router() -> Router {
        let controller = Arc::new(WorkflowController::new(
            Arc::new(CannedGateway),
            Duration::from_millis(1),
        ));
        analysis_router(controller)
    }

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        serde_json::from_slice(&bytes).expect("body is json")
    }

    #[tokio::test]
    async fn state_endpoint_reports_an_idle_controller() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/analysis/state")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["state"], "idle");
        assert!(body["report"].is_null());
    }

    #[tokio::test]
    async fn upload_without_a_document_type_is_unprocessable() {
        let payload = json!({
            "files": [{
                "filename": "apolice.jpg",
                "content_type": "image/jpeg",
                "content": "c2Nhbg=="
            }]
        });
        let response = router()
            .oneshot(json_request("/api/v1/analysis/upload", payload))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .expect("error message present")
            .contains("document type"));
    }

    #[tokio::test]
    async fn full_surface_drives_an_analysis_to_completion() {
        let app = router();

        let response = app
            .clone()
            .oneshot(json_request(
                "/api/v1/analysis/document-type",
                json!({ "document_type": "insurance_policy" }),
            ))
            .await
            .expect("type selection responds");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request(
                "/api/v1/analysis/upload",
                json!({
                    "files": [{
                        "filename": "apolice_teste.jpg",
                        "content_type": "image/jpeg",
                        "content": "c2Nhbg=="
                    }]
                }),
            ))
            .await
            .expect("upload responds");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["fields"][0]["label"], "numero da apolice");
        assert_eq!(body["fields"][0]["value"], "42");
    }

    #[tokio::test]
    async fn malformed_base64_content_is_rejected_before_the_workflow() {
        let payload = json!({
            "files": [{
                "filename": "apolice.jpg",
                "content_type": "image/jpeg",
                "content": "*not base64*"
            }]
        });
        let response = router()
            .oneshot(json_request("/api/v1/analysis/upload", payload))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
