//! The prompted extraction call to the hosted model.
//!
//! One document, one request, one attempt. There is no retry: a failed call
//! is reported to the user, who decides whether to submit again.
//!
//! The pipeline talks to the model through [`ModelClient`] so tests (and
//! callers with their own transport) can stand in for the network.
//! [`LlmClient`] is the production implementation on top of
//! `edgequake-llm`.

use crate::config::ExtractionConfig;
use crate::error::Po2XlError;
use crate::pipeline::encode::encode_image;
use crate::pipeline::intake::{DocumentKind, UploadedDocument};
use crate::prompts::{pdf_text_message, PO_EXTRACTION_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// MIME type used when the payload is extracted PDF text.
pub const TEXT_PLAIN: &str = "text/plain";

/// Everything sent to the model for one document.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// `image/jpeg`, `image/png`, or `text/plain` for PDF text.
    pub media_type: String,
    pub payload: Vec<u8>,
    pub prompt: String,
}

impl ExtractionRequest {
    /// Request for an image document: the image bytes are sent as-is.
    pub fn for_image(doc: &UploadedDocument, prompt: impl Into<String>) -> Result<Self, Po2XlError> {
        if doc.kind() != DocumentKind::Image {
            return Err(Po2XlError::Internal(format!(
                "'{}' is a PDF; send its extracted text instead",
                doc.name
            )));
        }
        Ok(Self {
            media_type: doc.media_type.mime().to_string(),
            payload: doc.bytes.clone(),
            prompt: prompt.into(),
        })
    }

    /// Request for the extracted text of a PDF.
    pub fn for_pdf_text(text: &str, prompt: impl Into<String>) -> Self {
        Self {
            media_type: TEXT_PLAIN.to_string(),
            payload: text.as_bytes().to_vec(),
            prompt: prompt.into(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.media_type == TEXT_PLAIN
    }

    /// Build the chat messages for this request.
    ///
    /// Images go as an attachment on a user turn whose text is the prompt.
    /// PDF text is appended to the prompt in a single user turn.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        if self.is_text() {
            let text = String::from_utf8_lossy(&self.payload);
            vec![ChatMessage::user(pdf_text_message(&self.prompt, &text))]
        } else {
            let image = encode_image(&self.media_type, &self.payload);
            vec![ChatMessage::user_with_images(self.prompt.as_str(), vec![image])]
        }
    }
}

/// The model's raw answer.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

impl ModelReply {
    /// A reply carrying only text, with no usage figures.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Anything that can answer an [`ExtractionRequest`].
pub trait ModelClient: Send + Sync {
    /// Issue exactly one extraction call.
    fn extract<'a>(
        &'a self,
        request: &'a ExtractionRequest,
    ) -> BoxFuture<'a, Result<ModelReply, Po2XlError>>;
}

/// [`ModelClient`] backed by an `edgequake-llm` provider.
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout_secs: u64,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout_secs: config.api_timeout_secs,
        }
    }
}

impl ModelClient for LlmClient {
    fn extract<'a>(
        &'a self,
        request: &'a ExtractionRequest,
    ) -> BoxFuture<'a, Result<ModelReply, Po2XlError>> {
        Box::pin(async move {
            let start = Instant::now();
            let messages = request.to_messages();
            info!(
                "Sending {} payload ({} bytes) to the extraction model",
                request.media_type,
                request.payload.len()
            );

            let call = self.provider.chat(&messages, Some(&self.options));
            let result = if self.timeout_secs > 0 {
                tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
                    .await
                    .map_err(|_| Po2XlError::ApiTimeout {
                        secs: self.timeout_secs,
                    })?
            } else {
                call.await
            };

            let response = result.map_err(|e| {
                let message = format!("{}", e);
                warn!("Extraction call failed: {}", message);
                Po2XlError::LlmApiError { message }
            })?;

            let duration = start.elapsed();
            debug!(
                "{} input tokens, {} output tokens, {:?}",
                response.prompt_tokens, response.completion_tokens, duration
            );
            debug!("Raw response: {}", response.content);

            let input_tokens = response.prompt_tokens as usize;
            let output_tokens = response.completion_tokens as usize;
            Ok(ModelReply {
                text: response.content,
                input_tokens,
                output_tokens,
                duration_ms: duration.as_millis() as u64,
            })
        })
    }
}

/// Reject a reply with no text in it.
pub fn require_text(reply: ModelReply) -> Result<ModelReply, Po2XlError> {
    if reply.text.trim().is_empty() {
        return Err(Po2XlError::EmptyResponse);
    }
    Ok(reply)
}

/// The prompt to send, honouring a configured override.
pub fn prompt_for(config: &ExtractionConfig) -> &str {
    config.prompt.as_deref().unwrap_or(PO_EXTRACTION_PROMPT)
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
