use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::infra::{parse_document_type, ScriptedAnalysisGateway};
use docfield::error::AppError;
use docfield::workflows::analysis::{DocumentType, UploadDocument, WorkflowController};

const DEMO_POLL_DELAY: Duration = Duration::from_millis(150);

// Minimal JPEG preamble so the demo payload looks like the scans operators upload.
const SAMPLE_SCAN: &[u8] = &[
    0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0x4a, 0x46, 0x49, 0x46, 0x00, 0x01,
];

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Document type to classify the scan as ('apolice' or 'nfe')
    #[arg(long, default_value = "apolice", value_parser = parse_document_type)]
    pub(crate) document_type: DocumentType,
    /// Additional field names to extract on top of the fixed set (repeatable)
    #[arg(long = "tag")]
    pub(crate) tags: Vec<String>,
    /// Upload a real scan instead of the bundled sample bytes
    #[arg(long)]
    pub(crate) file: Option<PathBuf>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        document_type,
        tags,
        file,
    } = args;

    let controller = Arc::new(WorkflowController::new(
        Arc::new(ScriptedAnalysisGateway::default()),
        DEMO_POLL_DELAY,
    ));

    controller
        .select_document_type(document_type)
        .map_err(|err| AppError::Analysis(err.into()))?;
    for tag in &tags {
        controller
            .add_custom_tag(tag)
            .map_err(|err| AppError::Analysis(err.into()))?;
    }

    let upload = match file {
        Some(path) => {
            let bytes = std::fs::read(&path)?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "scan.jpg".to_string());
            let content_type = mime_guess::from_path(&path).first_or_octet_stream().to_string();
            UploadDocument {
                filename,
                content_type,
                bytes,
            }
        }
        None => UploadDocument {
            filename: format!("{}_demonstracao.jpg", document_type.filename_token()),
            content_type: "image/jpeg".to_string(),
            bytes: SAMPLE_SCAN.to_vec(),
        },
    };

    println!("== Document Field Extraction Demo ==");
    println!("Document type: {}", document_type.label());
    let snapshot = controller.snapshot();
    println!("Fixed fields:  {}", snapshot.fixed_tags.join(", "));
    if !snapshot.custom_tags.is_empty() {
        println!("Custom fields: {}", snapshot.custom_tags.join(", "));
    }
    println!("Uploading '{}'...", upload.filename);

    let report = controller
        .upload(vec![upload])
        .await
        .map_err(AppError::Analysis)?;

    println!();
    println!(
        "Extraction completed at {}",
        report.analyzed_at.with_timezone(&chrono::Local).to_rfc3339()
    );
    for field in &report.fields {
        let value = if field.value.is_empty() {
            "(not found)"
        } else {
            field.value.as_str()
        };
        println!("  {:<40} {}", field.label, value);
    }

    Ok(())
}
