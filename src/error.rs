//! Error types for the po2xl library.
//!
//! Every failure a single submission can hit is a [`Po2XlError`]. The
//! variants are grouped by the stage that raises them, and
//! [`Po2XlError::kind`] collapses them into the five kinds a user actually
//! needs to tell apart:
//!
//! * **Input**: nothing usable was submitted (no file, wrong type, unreadable).
//! * **Extraction**: the PDF could not be read or the hosted model call failed.
//! * **Parse**: the model answered, but not with a table we can read.
//! * **Export**: the spreadsheet could not be produced or written.
//! * **Config**: the process is misconfigured (bad option, missing API key).
//!
//! None of these is fatal to a running [`crate::session::ExtractionSession`]:
//! the session turns them into an [`crate::session::UploadReport`] and keeps
//! accepting documents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the po2xl library.
#[derive(Debug, Error)]
pub enum Po2XlError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No document was submitted.
    #[error("No file uploaded.")]
    NoFile,

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The declared or inferred media type is not one we accept.
    #[error("Unsupported file type '{media_type}'\nUpload a JPG, JPEG, PNG or PDF purchase order.")]
    UnsupportedMediaType { media_type: String },

    /// The file was present but contained no bytes.
    #[error("File '{name}' is empty")]
    EmptyFile { name: String },

    /// The bytes do not match the declared media type.
    #[error("File '{name}' was declared as {declared} but its content looks like {detected}")]
    ContentMismatch {
        name: String,
        declared: String,
        detected: String,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF text extraction needs the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' could not be read: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// The PDF parsed but carries no text layer (e.g. a scan).
    #[error("PDF '{name}' contains no extractable text ({pages} pages)\nUpload the scan as a JPG or PNG image instead.")]
    NoExtractableText { name: String, pages: usize },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The hosted model call failed.
    #[error("Error with the extraction model: {message}")]
    LlmApiError { message: String },

    /// The hosted model answered with an empty string.
    #[error("Empty response from the extraction model. Unable to extract data.")]
    EmptyResponse,

    /// The hosted model did not answer within the configured timeout.
    #[error("Extraction model call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// The model's answer could not be read as a table.
    #[error("Failed to process the response. Please try again. Error: {0}")]
    Parse(#[from] ParseError),

    // ── Export errors ─────────────────────────────────────────────────────
    /// The workbook could not be serialised.
    #[error("Failed to build the Excel file: {0}")]
    ExportFailed(String),

    /// Could not create or write the output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No API key for the hosted model could be found.
    #[error(
        "No API key found for the extraction model.\n\
Set GEMINI_API_KEY (or GOOGLE_API_KEY) in the environment or in a .env file."
    )]
    MissingApiKey,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a model response could not be read as a table.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ParseError {
    /// The response was empty or whitespace-only.
    #[error("the response is empty")]
    Empty,

    /// No line of the response contains a `|` delimiter.
    #[error("the response is not a pipe-delimited table")]
    NotTabular,

    /// A data row has more fields than the header.
    #[error("expected {expected} fields in line {line}, saw {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// Only a header line was found.
    #[error("the table has a header but no data rows")]
    NoDataRows,

    /// Every column was a placeholder column.
    #[error("the table has no named columns")]
    NoColumns,
}

/// Coarse classification of a [`Po2XlError`], used for user-facing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Input,
    Extraction,
    Parse,
    Export,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Input => "input error",
            ErrorKind::Extraction => "extraction error",
            ErrorKind::Parse => "parse error",
            ErrorKind::Export => "export error",
            ErrorKind::Config => "configuration error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

impl Po2XlError {
    /// The kind of failure, for reporting.
    pub fn kind(&self) -> ErrorKind {
        use Po2XlError::*;
        match self {
            NoFile
            | FileNotFound { .. }
            | PermissionDenied { .. }
            | UnsupportedMediaType { .. }
            | EmptyFile { .. }
            | ContentMismatch { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. } => ErrorKind::Input,
            PdfiumBindingFailed(_)
            | CorruptPdf { .. }
            | PasswordRequired { .. }
            | WrongPassword { .. }
            | NoExtractableText { .. }
            | ProviderNotConfigured { .. }
            | LlmApiError { .. }
            | EmptyResponse
            | ApiTimeout { .. } => ErrorKind::Extraction,
            Parse(_) => ErrorKind::Parse,
            ExportFailed(_) | OutputWriteFailed { .. } => ErrorKind::Export,
            InvalidConfig(_) | MissingApiKey => ErrorKind::Config,
            Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_row_display() {
        let e = Po2XlError::from(ParseError::RaggedRow {
            line: 4,
            expected: 9,
            found: 10,
        });
        let msg = e.to_string();
        assert!(msg.contains("line 4"), "got: {msg}");
        assert!(msg.contains("saw 10"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::Parse);
    }

    #[test]
    fn empty_response_is_extraction_error() {
        let e = Po2XlError::EmptyResponse;
        assert_eq!(e.kind(), ErrorKind::Extraction);
        assert!(e.to_string().contains("Empty response"));
    }

    #[test]
    fn unsupported_type_is_input_error() {
        let e = Po2XlError::UnsupportedMediaType {
            media_type: "image/gif".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Input);
        assert!(e.to_string().contains("image/gif"));
    }

    #[test]
    fn missing_key_mentions_both_variables() {
        let msg = Po2XlError::MissingApiKey.to_string();
        assert!(msg.contains("GEMINI_API_KEY"));
        assert!(msg.contains("GOOGLE_API_KEY"));
        assert_eq!(Po2XlError::MissingApiKey.kind(), ErrorKind::Config);
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::Parse.to_string(), "parse error");
        assert_eq!(ErrorKind::Input.to_string(), "input error");
    }
}
