use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_analysis_routes;
use docfield::config::{AnalysisConfig, AppConfig};
use docfield::error::AppError;
use docfield::telemetry;
use docfield::workflows::analysis::{
    AnalysisError, DocumentIntelligenceClient, WorkflowController,
};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let analysis_config = AnalysisConfig::from_env()?;
    let poll_delay = analysis_config.poll_delay;
    let gateway = DocumentIntelligenceClient::new(analysis_config)
        .map_err(|err| AppError::Analysis(AnalysisError::Client(err)))?;
    let controller = Arc::new(WorkflowController::new(Arc::new(gateway), poll_delay));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_analysis_routes(controller)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, poll_delay_ms = poll_delay.as_millis() as u64, "document field extractor ready");

    axum::serve(listener, app).await?;
    Ok(())
}
