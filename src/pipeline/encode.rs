//! Image encoding: uploaded image bytes → base64 `ImageData`.
//!
//! The upload is forwarded as-is, in its own format. Re-encoding a phone
//! photo of a purchase order would only add compression artefacts to the
//! digits the model has to read.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap image bytes for the multimodal request.
///
/// `detail: "high"` keeps small print (item codes, unit prices) legible to
/// providers that tile images.
pub fn encode_image(mime_type: &str, bytes: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} image → {} bytes base64", mime_type, b64.len());
    ImageData::new(b64, mime_type).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_image_with_its_own_mime() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0];
        let data = encode_image("image/jpeg", &bytes);
        assert_eq!(data.mime_type, "image/jpeg");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), bytes);
    }
}
