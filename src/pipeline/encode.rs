//! Base64 encoding: image bytes ⇄ inline API payloads and `data:` URIs.
//!
//! Vision APIs take images inline as base64 in the JSON body, and the
//! editor stores substituted dish photos as `data:` URIs so a document stays
//! self-contained. Both directions live here.

use crate::pipeline::input::ImageUpload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Base64 body of an upload, for inline API payloads.
pub fn encode_upload(upload: &ImageUpload) -> String {
    let b64 = STANDARD.encode(&upload.bytes);
    debug!("Encoded {} → {} bytes base64", upload.mime_type, b64.len());
    b64
}

/// `data:<mime>;base64,<body>` URI for an upload.
pub fn to_data_uri(upload: &ImageUpload) -> String {
    format!("data:{};base64,{}", upload.mime_type, encode_upload(upload))
}

/// Split a base64 `data:` URI into its MIME type and decoded bytes.
///
/// Returns `None` for anything that is not a well-formed base64 data URI
/// (remote URLs, relative paths, percent-encoded data URIs).
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, body) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(body.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload() -> ImageUpload {
        ImageUpload {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png".into(),
        }
    }

    #[test]
    fn data_uri_shape() {
        assert_eq!(to_data_uri(&upload()), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn decode_data_uri_recovers_bytes() {
        let (mime, bytes) = decode_data_uri("data:image/png;base64,iVBORw==").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, upload().bytes);
    }

    #[test]
    fn decode_rejects_non_data_uris() {
        assert!(decode_data_uri("/api/placeholder/200/200").is_none());
        assert!(decode_data_uri("https://example.com/a.png").is_none());
        assert!(decode_data_uri("data:text/plain,hello").is_none());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_none());
    }
}
