//! # po2xl
//!
//! Turn a purchase-order image or PDF into a spreadsheet using a hosted
//! multimodal model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! JPG / PNG / PDF
//!  │
//!  ├─ 1. Intake   classify the upload (local file, URL or in-memory bytes)
//!  ├─ 2. Text     PDFs only: pull the text layer via pdfium (spawn_blocking)
//!  ├─ 3. Model    one prompted call: image bytes or PDF text + fixed prompt
//!  ├─ 4. Parse    pipe-delimited answer → ParsedTable
//!  └─ 5. Export   ParsedTable → in-memory data.xlsx
//! ```
//!
//! The model is asked for seven fields per line item: vendor name, vendor
//! city, item code, item name, quantity, unit price and total price.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use po2xl::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini key read from GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let output = extract("purchase_order.png", &config).await?;
//!     print!("{}", output.table.render());
//!     output.artifact.write_to_dir(std::path::Path::new(".")).await?;
//!     Ok(())
//! }
//! ```
//!
//! Hosts that accept one document after another should keep an
//! [`ExtractionSession`] open: it reports each failure as a value and stays
//! usable for the next submission.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `po2xl` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{api_key_from_env, ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ErrorKind, ParseError, Po2XlError};
pub use export::{export_xlsx, ExportArtifact, EXPORT_FILE_NAME, XLSX_MIME};
pub use extract::{
    extract, extract_sync, extract_to_file, inspect, DocumentSummary, ExtractionOutput,
    ExtractionStats,
};
pub use pipeline::intake::{MediaType, RawUpload};
pub use pipeline::llm::{ExtractionRequest, LlmClient, ModelClient, ModelReply};
pub use pipeline::parse::parse_response;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use session::{ExtractionSession, FailedUpload, SessionStats, UploadReport};
pub use table::ParsedTable;
