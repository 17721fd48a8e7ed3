//! Progress-callback trait for per-document extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to be told
//! which stage a document is in. The model call can take tens of seconds, so
//! a host UI wants at least a spinner that says what it is waiting on.
//!
//! # Example
//!
//! ```rust
//! use po2xl::{ExtractionConfig, ExtractionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl ExtractionProgressCallback for PrintStages {
//!     fn on_stage(&self, document: &str, stage: Stage) {
//!         eprintln!("{document}: {stage}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(PrintStages) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The pipeline stage a document has entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Classifying the submitted file.
    Intake,
    /// Pulling the text layer out of a PDF.
    PdfText,
    /// Waiting on the hosted model.
    Model,
    /// Reading the model's answer as a table.
    Parse,
    /// Building the spreadsheet artifact.
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Intake => "reading document",
            Stage::PdfText => "extracting PDF text",
            Stage::Model => "waiting for the extraction model",
            Stage::Parse => "parsing response",
            Stage::Export => "building Excel file",
        };
        f.write_str(s)
    }
}

/// Called by the pipeline as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before intake.
    fn on_document_start(&self, document: &str) {
        let _ = document;
    }

    /// Called when the document enters a new stage.
    fn on_stage(&self, document: &str, stage: Stage) {
        let _ = (document, stage);
    }

    /// Called when a table was extracted.
    ///
    /// # Arguments
    /// * `rows`: data rows in the final table
    /// * `columns`: named columns in the final table
    fn on_document_complete(&self, document: &str, rows: usize, columns: usize) {
        let _ = (document, rows, columns);
    }

    /// Called when the document failed at any stage.
    fn on_document_error(&self, document: &str, error: &str) {
        let _ = (document, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<Stage>>,
        completed: Mutex<Option<(usize, usize)>>,
    }

    impl ExtractionProgressCallback for Recorder {
        fn on_stage(&self, _document: &str, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_document_complete(&self, _document: &str, rows: usize, columns: usize) {
            *self.completed.lock().unwrap() = Some((rows, columns));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_start("po.pdf");
        cb.on_stage("po.pdf", Stage::Model);
        cb.on_document_complete("po.pdf", 3, 7);
        cb.on_document_error("po.pdf", "boom");
    }

    #[test]
    fn recorder_sees_stages_in_order() {
        let rec = Recorder::default();
        rec.on_stage("po.png", Stage::Intake);
        rec.on_stage("po.png", Stage::Model);
        rec.on_stage("po.png", Stage::Parse);
        rec.on_document_complete("po.png", 2, 7);

        assert_eq!(
            *rec.stages.lock().unwrap(),
            vec![Stage::Intake, Stage::Model, Stage::Parse]
        );
        assert_eq!(*rec.completed.lock().unwrap(), Some((2, 7)));
    }

    #[test]
    fn stage_display_is_human_readable() {
        assert_eq!(Stage::PdfText.to_string(), "extracting PDF text");
    }
}
