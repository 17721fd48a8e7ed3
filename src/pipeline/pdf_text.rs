//! PDF text extraction via pdfium.
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not run on a Tokio worker. Extraction therefore happens in
//! `tokio::task::spawn_blocking`.
//!
//! Any failure aborts the document. There is no per-page fallback: a
//! purchase order missing a page would produce a table missing line items,
//! which is worse than an error the user can see.

use crate::error::Po2XlError;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Text layer of a PDF, all pages concatenated in page order.
#[derive(Debug, Clone)]
pub struct PdfText {
    pub text: String,
    pub page_count: usize,
}

/// Extract the text of every page of `bytes`.
///
/// `name` is only used in error messages.
pub async fn extract_text(
    name: &str,
    bytes: Vec<u8>,
    password: Option<&str>,
) -> Result<PdfText, Po2XlError> {
    let name = name.to_string();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_text_blocking(&name, &bytes, password.as_deref()))
        .await
        .map_err(|e| Po2XlError::Internal(format!("PDF text task panicked: {}", e)))?
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then a library in the working
/// directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, Po2XlError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Po2XlError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of text extraction.
fn extract_text_blocking(
    name: &str,
    bytes: &[u8],
    password: Option<&str>,
) -> Result<PdfText, Po2XlError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Po2XlError::WrongPassword {
                    name: name.to_string(),
                }
            } else {
                Po2XlError::PasswordRequired {
                    name: name.to_string(),
                }
            }
        } else {
            Po2XlError::CorruptPdf {
                name: name.to_string(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    info!("PDF '{}' loaded: {} pages", name, page_count);

    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        let page_text = page.text().map_err(|e| Po2XlError::CorruptPdf {
            name: name.to_string(),
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        let content = page_text.all();
        debug!("Page {}: {} chars of text", idx + 1, content.len());
        push_page(&mut text, &content);
    }

    if text.trim().is_empty() {
        return Err(Po2XlError::NoExtractableText {
            name: name.to_string(),
            pages: page_count,
        });
    }

    Ok(PdfText { text, page_count })
}

/// Append one page's text, keeping pages on separate lines.
fn push_page(buf: &mut String, page: &str) {
    buf.push_str(page);
    if !page.is_empty() && !page.ends_with('\n') {
        buf.push('\n');
    }
}

/// The first `max_chars` characters of `text` followed by `...`, the way the
/// extracted text is previewed before the model call.
pub fn preview(text: &str, max_chars: usize) -> String {
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_newline_separated() {
        let mut buf = String::new();
        push_page(&mut buf, "Page one");
        push_page(&mut buf, "");
        push_page(&mut buf, "Page two\n");
        assert_eq!(buf, "Page one\nPage two\n");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("Großhändler GmbH", 5), "Großh...");
        assert_eq!(preview("abc", 1500), "abc...");
    }
}
