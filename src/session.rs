//! A long-lived extraction session that survives bad submissions.
//!
//! The session owns the model client and the configuration and takes
//! documents one at a time (`&mut self`). Whatever goes wrong with a
//! document (no file, wrong type, model failure, unparseable answer) comes
//! back as an [`UploadReport::Failed`] with a user-facing message, and the
//! session is ready for the next document.

use crate::config::ExtractionConfig;
use crate::error::{ErrorKind, Po2XlError};
use crate::export::ExportArtifact;
use crate::extract::{self, ExtractionOutput};
use crate::pipeline::intake::RawUpload;
use crate::pipeline::llm::ModelClient;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// A failed submission, ready to show to the user.
#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub document: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one submission.
#[derive(Debug, Clone, Serialize)]
pub enum UploadReport {
    Extracted(Box<ExtractionOutput>),
    Failed(FailedUpload),
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadReport::Extracted(_))
    }

    pub fn output(&self) -> Option<&ExtractionOutput> {
        match self {
            UploadReport::Extracted(out) => Some(out),
            UploadReport::Failed(_) => None,
        }
    }

    /// The downloadable workbook, present only on success.
    pub fn artifact(&self) -> Option<&ExportArtifact> {
        self.output().map(|o| &o.artifact)
    }

    pub fn failure(&self) -> Option<&FailedUpload> {
        match self {
            UploadReport::Extracted(_) => None,
            UploadReport::Failed(f) => Some(f),
        }
    }
}

/// Running totals for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub submitted: usize,
    pub extracted: usize,
    pub failed: usize,
}

/// Processes purchase-order submissions one at a time.
pub struct ExtractionSession {
    client: Arc<dyn ModelClient>,
    config: ExtractionConfig,
    stats: SessionStats,
}

impl ExtractionSession {
    /// Resolve the model provider from `config` and open a session.
    ///
    /// # Errors
    /// [`Po2XlError::ProviderNotConfigured`] when no provider can be built,
    /// typically because the API key is missing.
    pub async fn connect(config: ExtractionConfig) -> Result<Self, Po2XlError> {
        let client = extract::client_from_config(&config).await?;
        Ok(Self::with_client(Arc::new(client), config))
    }

    /// Open a session around an existing model client.
    pub fn with_client(client: Arc<dyn ModelClient>, config: ExtractionConfig) -> Self {
        Self {
            client,
            config,
            stats: SessionStats::default(),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Process an in-memory submission. `None` means nothing was uploaded.
    pub async fn submit(&mut self, upload: Option<RawUpload>) -> UploadReport {
        let name = upload
            .as_ref()
            .map(|u| u.name.clone())
            .unwrap_or_else(|| "<no file>".to_string());
        let result = extract::extract_upload(upload, self.client.as_ref(), &self.config).await;
        self.record(name, result)
    }

    /// Process a local path or URL.
    pub async fn submit_input(&mut self, input: &str, declared_type: Option<&str>) -> UploadReport {
        let result =
            extract::extract_input(input, declared_type, self.client.as_ref(), &self.config).await;
        self.record(input.to_string(), result)
    }

    fn record(
        &mut self,
        document: String,
        result: Result<ExtractionOutput, Po2XlError>,
    ) -> UploadReport {
        self.stats.submitted += 1;
        match result {
            Ok(output) => {
                self.stats.extracted += 1;
                info!("'{}' extracted", document);
                UploadReport::Extracted(Box::new(output))
            }
            Err(e) => {
                self.stats.failed += 1;
                let kind = e.kind();
                error!("'{}' failed ({}): {}", document, kind, e);
                UploadReport::Failed(FailedUpload {
                    document,
                    kind,
                    message: e.to_string(),
                })
            }
        }
    }
}
