//! End-to-end extraction of one purchase-order document.
//!
//! ```text
//! intake → (pdf text) → model call → parse → export
//! ```
//!
//! Every function here returns `Err` on the first failing stage. Containing
//! those errors so a caller can keep going is the job of
//! [`crate::session::ExtractionSession`].

use crate::config::{ExtractionConfig, DEFAULT_PROVIDER};
use crate::error::Po2XlError;
use crate::export::{export_xlsx, ExportArtifact};
use crate::pipeline::intake::{self, DocumentKind, MediaType, RawUpload, UploadedDocument};
use crate::pipeline::llm::{self, ExtractionRequest, LlmClient, ModelClient};
use crate::pipeline::{parse, pdf_text};
use crate::progress::Stage;
use crate::table::ParsedTable;
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// What is shown about the document before its table.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub media_type: MediaType,
    pub size_bytes: usize,
    /// Width and height in pixels, for images.
    pub image_dimensions: Option<(u32, u32)>,
    /// Page count, for PDFs.
    pub page_count: Option<usize>,
    /// Leading part of the extracted text, for PDFs.
    pub text_preview: Option<String>,
}

/// Timing and token usage for one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a successful extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    pub summary: DocumentSummary,
    pub table: ParsedTable,
    /// The model's answer exactly as received.
    pub raw_response: String,
    pub artifact: ExportArtifact,
    pub stats: ExtractionStats,
}

/// Extract a purchase order from a local path or URL.
///
/// This is the primary entry point for the library. The model provider is
/// resolved from `config` (see [`resolve_provider`]).
///
/// # Errors
/// The first input, extraction, parse or export error hit.
pub async fn extract(
    input: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Po2XlError> {
    let client = client_from_config(config).await?;
    extract_input(input.as_ref(), None, &client, config).await
}

/// Extract a purchase order and write `data.xlsx` into `output_dir`.
///
/// Returns the path of the written workbook.
pub async fn extract_to_file(
    input: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<PathBuf, Po2XlError> {
    let output = extract(input, config).await?;
    output.artifact.write_to_dir(output_dir.as_ref()).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Po2XlError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Po2XlError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, config))
}

/// Read and classify a document without calling the model.
///
/// Does not require an API key.
pub async fn inspect(
    input: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<DocumentSummary, Po2XlError> {
    let raw = intake::resolve_input(input.as_ref(), None, config.download_timeout_secs).await?;
    let doc = intake::accept(Some(raw))?;
    let (summary, _) = summarise(&doc, config).await?;
    Ok(summary)
}

/// Extract from a local path or URL with an explicit model client.
///
/// `declared_type` overrides the media type inferred from the file name or
/// HTTP headers.
pub async fn extract_input(
    input: &str,
    declared_type: Option<&str>,
    client: &dyn ModelClient,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Po2XlError> {
    notify_start(config, input);
    let result = async {
        notify_stage(config, input, Stage::Intake);
        let raw =
            intake::resolve_input(input, declared_type, config.download_timeout_secs).await?;
        let doc = intake::accept(Some(raw))?;
        extract_document(&doc, client, config).await
    }
    .await;
    notify_end(config, input, &result);
    result
}

/// Extract from an in-memory submission with an explicit model client.
pub async fn extract_upload(
    upload: Option<RawUpload>,
    client: &dyn ModelClient,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Po2XlError> {
    let name = upload
        .as_ref()
        .map(|u| u.name.clone())
        .unwrap_or_else(|| "<no file>".to_string());
    notify_start(config, &name);
    let result = async {
        notify_stage(config, &name, Stage::Intake);
        let doc = intake::accept(upload)?;
        extract_document(&doc, client, config).await
    }
    .await;
    notify_end(config, &name, &result);
    result
}

/// Run a classified document through the model, parser and exporter.
pub async fn extract_document(
    doc: &UploadedDocument,
    client: &dyn ModelClient,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Po2XlError> {
    let start = Instant::now();
    let prompt = llm::prompt_for(config);

    // ── Step 1: Build the request ────────────────────────────────────────
    let (summary, pdf_text) = summarise(doc, config).await?;
    let request = match pdf_text {
        Some(text) => ExtractionRequest::for_pdf_text(&text, prompt),
        None => ExtractionRequest::for_image(doc, prompt)?,
    };

    // ── Step 2: One model call ───────────────────────────────────────────
    notify_stage(config, &doc.name, Stage::Model);
    let reply = llm::require_text(client.extract(&request).await?)?;

    // ── Step 3: Parse the answer ─────────────────────────────────────────
    notify_stage(config, &doc.name, Stage::Parse);
    let table = parse::parse_response(&reply.text)?;
    info!(
        "'{}': extracted {} rows × {} columns",
        doc.name,
        table.row_count(),
        table.column_count()
    );

    // ── Step 4: Export ───────────────────────────────────────────────────
    notify_stage(config, &doc.name, Stage::Export);
    let artifact = export_xlsx(&table)?;

    Ok(ExtractionOutput {
        summary,
        table,
        raw_response: reply.text,
        artifact,
        stats: ExtractionStats {
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            model_duration_ms: reply.duration_ms,
            total_duration_ms: start.elapsed().as_millis() as u64,
        },
    })
}

/// Describe the document; for PDFs also return the full extracted text.
async fn summarise(
    doc: &UploadedDocument,
    config: &ExtractionConfig,
) -> Result<(DocumentSummary, Option<String>), Po2XlError> {
    let mut summary = DocumentSummary {
        name: doc.name.clone(),
        media_type: doc.media_type,
        size_bytes: doc.bytes.len(),
        image_dimensions: None,
        page_count: None,
        text_preview: None,
    };

    match doc.kind() {
        DocumentKind::Image => {
            summary.image_dimensions = intake::image_dimensions(&doc.bytes);
            Ok((summary, None))
        }
        DocumentKind::Pdf => {
            notify_stage(config, &doc.name, Stage::PdfText);
            let extracted =
                pdf_text::extract_text(&doc.name, doc.bytes.clone(), config.password.as_deref())
                    .await?;
            summary.page_count = Some(extracted.page_count);
            summary.text_preview = Some(pdf_text::preview(&extracted.text, config.preview_chars));
            Ok((summary, Some(extracted.text)))
        }
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Build the production model client for `config`.
pub async fn client_from_config(config: &ExtractionConfig) -> Result<LlmClient, Po2XlError> {
    let provider = resolve_provider(config).await?;
    Ok(LlmClient::new(provider, config))
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Po2XlError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Po2XlError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or
///    the default model.
/// 3. **Environment pair** (`PO2XL_PROVIDER` + `PO2XL_MODEL`); both must
///    be set and non-empty.
/// 4. **Default**: Gemini with `config.model` or `gemini-1.5-flash`. The
///    factory reads `GEMINI_API_KEY` from the environment.
pub async fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<Arc<dyn LLMProvider>, Po2XlError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("PO2XL_PROVIDER"),
        std::env::var("PO2XL_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    create_provider(DEFAULT_PROVIDER, config.model_or_default())
}

// ── Progress helpers ─────────────────────────────────────────────────────

fn notify_start(config: &ExtractionConfig, document: &str) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(document);
    }
}

fn notify_stage(config: &ExtractionConfig, document: &str, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(document, stage);
    }
}

fn notify_end(
    config: &ExtractionConfig,
    document: &str,
    result: &Result<ExtractionOutput, Po2XlError>,
) {
    if let Some(ref cb) = config.progress_callback {
        match result {
            Ok(out) => cb.on_document_complete(
                document,
                out.table.row_count(),
                out.table.column_count(),
            ),
            Err(e) => cb.on_document_error(document, &e.to_string()),
        }
    }
}
