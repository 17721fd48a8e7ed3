//! File intake: turn a submitted file into a classified [`UploadedDocument`].
//!
//! A submission is a name, an optional declared MIME type and the raw bytes.
//! The declared type is checked against what the bytes actually are: the
//! model will happily "read" a PDF sent as a JPEG and invent a purchase
//! order, so a mismatch has to be caught here rather than downstream.

use crate::error::Po2XlError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Media types accepted for purchase-order documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Jpeg,
    Png,
    Pdf,
}

/// Whether the document goes to the model as pixels or as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl MediaType {
    /// Parse a MIME type, ignoring parameters such as `; charset=binary`.
    ///
    /// `image/jpg` is accepted as an alias because browsers and HTTP servers
    /// still send it.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "application/pdf" => Some(MediaType::Pdf),
            _ => None,
        }
    }

    /// Infer the media type from a file extension (`jpg`, `jpeg`, `png`, `pdf`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "png" => Some(MediaType::Png),
            "pdf" => Some(MediaType::Pdf),
            _ => None,
        }
    }

    /// Infer the media type from the extension of a path or URL path.
    pub fn from_path(path: &str) -> Option<Self> {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical MIME string.
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Pdf => "application/pdf",
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            MediaType::Jpeg | MediaType::Png => DocumentKind::Image,
            MediaType::Pdf => DocumentKind::Pdf,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// A file as it was submitted, before classification.
#[derive(Debug, Clone)]
pub struct RawUpload {
    /// Display name (file name or URL).
    pub name: String,
    /// MIME type declared by whoever submitted the file, if any.
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl RawUpload {
    pub fn new(name: impl Into<String>, declared_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_type,
            bytes,
        }
    }
}

/// A classified purchase-order document held in memory for one request.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub name: String,
    pub media_type: MediaType,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn kind(&self) -> DocumentKind {
        self.media_type.kind()
    }
}

/// Classify a submission into an image or PDF document.
///
/// # Errors
/// All failures are input errors:
/// - `None` → [`Po2XlError::NoFile`]
/// - unknown declared type, or no declared type and no known extension →
///   [`Po2XlError::UnsupportedMediaType`]
/// - zero bytes → [`Po2XlError::EmptyFile`]
/// - content disagrees with the declared type → [`Po2XlError::ContentMismatch`]
pub fn accept(upload: Option<RawUpload>) -> Result<UploadedDocument, Po2XlError> {
    let upload = upload.ok_or(Po2XlError::NoFile)?;

    let declared = match upload.declared_type.as_deref() {
        Some(mime) => MediaType::from_mime(mime).ok_or_else(|| Po2XlError::UnsupportedMediaType {
            media_type: mime.to_string(),
        })?,
        None => MediaType::from_path(&upload.name).ok_or_else(|| {
            Po2XlError::UnsupportedMediaType {
                media_type: Path::new(&upload.name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| format!(".{e}"))
                    .unwrap_or_else(|| "unknown (no extension)".to_string()),
            }
        })?,
    };

    if upload.bytes.is_empty() {
        return Err(Po2XlError::EmptyFile { name: upload.name });
    }

    let media_type = verify_content(&upload.name, declared, &upload.bytes)?;
    info!(
        "Accepted '{}' as {} ({} bytes)",
        upload.name,
        media_type,
        upload.bytes.len()
    );

    Ok(UploadedDocument {
        name: upload.name,
        media_type,
        bytes: upload.bytes,
    })
}

/// Check the bytes against the declared type.
///
/// A PNG declared as JPEG (or the reverse) is corrected rather than rejected:
/// the file is still an image the model can read, only the label was wrong.
fn verify_content(name: &str, declared: MediaType, bytes: &[u8]) -> Result<MediaType, Po2XlError> {
    let detected = sniff(bytes);
    match (declared.kind(), detected) {
        (DocumentKind::Pdf, Some(MediaType::Pdf)) => Ok(MediaType::Pdf),
        (DocumentKind::Image, Some(found)) if found.kind() == DocumentKind::Image => {
            if found != declared {
                warn!(
                    "'{}' declared as {} but is {}; using {}",
                    name, declared, found, found
                );
            }
            Ok(found)
        }
        (_, found) => Err(Po2XlError::ContentMismatch {
            name: name.to_string(),
            declared: declared.mime().to_string(),
            detected: found
                .map(|m| m.mime().to_string())
                .unwrap_or_else(|| "unrecognised data".to_string()),
        }),
    }
}

/// Detect the media type from magic bytes.
fn sniff(bytes: &[u8]) -> Option<MediaType> {
    if bytes.starts_with(b"%PDF") {
        return Some(MediaType::Pdf);
    }
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => Some(MediaType::Jpeg),
        Ok(image::ImageFormat::Png) => Some(MediaType::Png),
        _ => None,
    }
}

/// Pixel dimensions of an image document, read from its header only.
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

// ── Input resolution ─────────────────────────────────────────────────────────

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local path or download a URL into a [`RawUpload`].
///
/// `declared_type` overrides whatever the file system or server says.
pub async fn resolve_input(
    input: &str,
    declared_type: Option<&str>,
    timeout_secs: u64,
) -> Result<RawUpload, Po2XlError> {
    if is_url(input) {
        download_url(input, declared_type, timeout_secs).await
    } else {
        read_local(input, declared_type).await
    }
}

/// Read a local file into memory.
async fn read_local(path_str: &str, declared_type: Option<&str>) -> Result<RawUpload, Po2XlError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Po2XlError::PermissionDenied { path: path.clone() },
        _ => Po2XlError::FileNotFound { path: path.clone() },
    })?;

    debug!("Read local file: {} ({} bytes)", path.display(), bytes.len());
    Ok(RawUpload::new(
        path_str,
        declared_type.map(str::to_string),
        bytes,
    ))
}

/// Download a URL into memory.
async fn download_url(
    url: &str,
    declared_type: Option<&str>,
    timeout_secs: u64,
) -> Result<RawUpload, Po2XlError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Po2XlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Po2XlError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Po2XlError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Po2XlError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Po2XlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let declared = declared_type
        .map(str::to_string)
        .or_else(|| declared_type_for_url(url, header_type.as_deref()));

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(RawUpload::new(url, declared, bytes.to_vec()))
}

/// Pick the declared type for a download: a recognised `Content-Type`
/// header wins, then the URL's extension. Generic types such as
/// `application/octet-stream` defer to the extension.
fn declared_type_for_url(url: &str, content_type: Option<&str>) -> Option<String> {
    if let Some(ct) = content_type {
        if MediaType::from_mime(ct).is_some() {
            return Some(ct.to_string());
        }
    }
    let path = reqwest::Url::parse(url)
        .ok()
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    MediaType::from_path(&path)
        .map(|m| m.mime().to_string())
        .or_else(|| content_type.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([255, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([0, 0, 0])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .expect("jpeg encode");
        buf
    }

    #[test]
    fn no_file_is_input_error() {
        let err = accept(None).unwrap_err();
        assert!(matches!(err, Po2XlError::NoFile));
    }

    #[test]
    fn mime_aliases() {
        assert_eq!(MediaType::from_mime("image/jpg"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_mime("IMAGE/JPEG"), Some(MediaType::Jpeg));
        assert_eq!(
            MediaType::from_mime("application/pdf; charset=binary"),
            Some(MediaType::Pdf)
        );
        assert_eq!(MediaType::from_mime("image/gif"), None);
    }

    #[test]
    fn extension_inference() {
        assert_eq!(MediaType::from_path("scan.JPG"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_path("/tmp/po.pdf"), Some(MediaType::Pdf));
        assert_eq!(MediaType::from_path("notes.txt"), None);
        assert_eq!(MediaType::from_path("README"), None);
    }

    #[test]
    fn accepts_png_by_extension() {
        let doc = accept(Some(RawUpload::new("po.png", None, png_bytes()))).unwrap();
        assert_eq!(doc.media_type, MediaType::Png);
        assert_eq!(doc.kind(), DocumentKind::Image);
    }

    #[test]
    fn accepts_pdf_by_declared_type() {
        let bytes = b"%PDF-1.7\n%fake body".to_vec();
        let doc = accept(Some(RawUpload::new(
            "upload",
            Some("application/pdf".into()),
            bytes,
        )))
        .unwrap();
        assert_eq!(doc.kind(), DocumentKind::Pdf);
    }

    #[test]
    fn unsupported_declared_type_rejected() {
        let err = accept(Some(RawUpload::new(
            "anim.gif",
            Some("image/gif".into()),
            b"GIF89a".to_vec(),
        )))
        .unwrap_err();
        assert!(matches!(err, Po2XlError::UnsupportedMediaType { .. }));
    }

    #[test]
    fn unknown_extension_rejected() {
        let err = accept(Some(RawUpload::new("po.docx", None, vec![1, 2, 3]))).unwrap_err();
        match err {
            Po2XlError::UnsupportedMediaType { media_type } => assert_eq!(media_type, ".docx"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_file_rejected() {
        let err = accept(Some(RawUpload::new("po.pdf", None, Vec::new()))).unwrap_err();
        assert!(matches!(err, Po2XlError::EmptyFile { .. }));
    }

    #[test]
    fn pdf_declared_as_image_is_mismatch() {
        let err = accept(Some(RawUpload::new(
            "po.png",
            None,
            b"%PDF-1.4 body".to_vec(),
        )))
        .unwrap_err();
        match err {
            Po2XlError::ContentMismatch { detected, .. } => assert_eq!(detected, "application/pdf"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn garbage_declared_as_pdf_is_mismatch() {
        let err = accept(Some(RawUpload::new("po.pdf", None, b"hello".to_vec()))).unwrap_err();
        assert!(matches!(err, Po2XlError::ContentMismatch { .. }));
    }

    #[test]
    fn mislabelled_image_is_corrected() {
        let doc = accept(Some(RawUpload::new("po.png", None, jpeg_bytes()))).unwrap();
        assert_eq!(doc.media_type, MediaType::Jpeg);
    }

    #[test]
    fn reads_image_dimensions() {
        assert_eq!(image_dimensions(&png_bytes()), Some((4, 3)));
        assert_eq!(image_dimensions(b"not an image"), None);
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/po.pdf"));
        assert!(is_url("http://example.com/po.png"));
        assert!(!is_url("/tmp/po.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn url_declared_type_prefers_specific_header() {
        assert_eq!(
            declared_type_for_url("https://x.test/download", Some("image/png")).as_deref(),
            Some("image/png")
        );
        assert_eq!(
            declared_type_for_url("https://x.test/po.pdf", Some("application/octet-stream"))
                .as_deref(),
            Some("application/pdf")
        );
        assert_eq!(
            declared_type_for_url("https://x.test/file", Some("text/html")).as_deref(),
            Some("text/html")
        );
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = resolve_input("/definitely/not/here.pdf", None, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Po2XlError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("po.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let raw = resolve_input(path.to_str().unwrap(), None, 5).await.unwrap();
        assert!(raw.declared_type.is_none());
        let doc = accept(Some(raw)).unwrap();
        assert_eq!(doc.media_type, MediaType::Png);
    }
}
