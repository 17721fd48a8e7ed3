//! Pipeline stages for purchase-order extraction.
//!
//! Each submodule implements exactly one step, so every step is testable on
//! its own and the model client can be swapped for a stub.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ pdf_text ──▶ encode ──▶ llm ──▶ parse
//! (path/URL)  (pdfium)     (base64)   (model)  (pipe table)
//! ```
//!
//! 1. [`intake`]:   read the submitted file and classify it as image or PDF
//! 2. [`pdf_text`]: pull the text layer out of a PDF; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`]:   base64-wrap image bytes for the multimodal request body
//! 4. [`llm`]:      one call to the hosted model; the only stage with
//!    network I/O besides URL downloads
//! 5. [`parse`]:    read the free-text answer as a pipe-delimited table

pub mod encode;
pub mod intake;
pub mod llm;
pub mod parse;
pub mod pdf_text;
