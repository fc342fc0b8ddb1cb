//! Input validation: turn user-supplied bytes or a local file into an
//! [`ImageUpload`] the model will accept.
//!
//! Browsers and multipart clients are sloppy about content types: `image/jpg`
//! instead of `image/jpeg`, `application/octet-stream` for everything, or no
//! type at all. The declared type is normalised first and only trusted when
//! it names a format the vision API understands; otherwise the magic bytes
//! decide. Size is capped before anything is base64-encoded so a huge upload
//! never doubles in memory.

use crate::error::MenuError;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// MIME types the vision backends accept.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "image/heic",
    "image/heif",
];

/// A validated menu photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageUpload {
    /// Validate raw bytes and a declared MIME type.
    ///
    /// Fails with [`MenuError::InvalidImage`] when the payload is empty,
    /// exceeds `max_bytes`, or is not a supported image format.
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        declared_mime: Option<&str>,
        max_bytes: usize,
    ) -> Result<Self, MenuError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(MenuError::InvalidImage {
                reason: "image is empty".into(),
            });
        }
        if bytes.len() > max_bytes {
            return Err(MenuError::InvalidImage {
                reason: format!("image is {} bytes, limit is {}", bytes.len(), max_bytes),
            });
        }

        let mime_type =
            resolve_mime(declared_mime, &bytes).ok_or_else(|| MenuError::InvalidImage {
                reason: format!(
                    "unsupported content type '{}'",
                    declared_mime.unwrap_or("unknown")
                ),
            })?;

        debug!("Accepted {} image, {} bytes", mime_type, bytes.len());
        Ok(Self { bytes, mime_type })
    }
}

/// Read a local image file, e.g. a replacement dish photo.
pub async fn load_local_image(path: &Path, max_bytes: usize) -> Result<ImageUpload, MenuError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| MenuError::InvalidImage {
            reason: format!("cannot read '{}': {}", path.display(), e),
        })?;
    if meta.len() > max_bytes as u64 {
        return Err(MenuError::InvalidImage {
            reason: format!("'{}' is {} bytes, limit is {}", path.display(), meta.len(), max_bytes),
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| MenuError::InvalidImage {
            reason: format!("cannot read '{}': {}", path.display(), e),
        })?;

    let declared = ImageFormat::from_path(path)
        .ok()
        .map(|f| f.to_mime_type())
        .or_else(|| heif_from_extension(path));

    ImageUpload::new(bytes, declared, max_bytes)
}

/// Normalise the declared type, falling back to magic-byte sniffing.
fn resolve_mime(declared: Option<&str>, bytes: &[u8]) -> Option<String> {
    let declared = declared.map(normalise_mime).filter(|m| !m.is_empty());

    match declared.as_deref() {
        Some(m) if SUPPORTED_MIME_TYPES.contains(&m) => return Some(m.to_string()),
        // Anything explicitly non-image is rejected without sniffing.
        Some(m) if !m.starts_with("image/") && m != "application/octet-stream" => return None,
        _ => {}
    }

    let sniffed = image::guess_format(bytes).ok()?.to_mime_type();
    SUPPORTED_MIME_TYPES
        .contains(&sniffed)
        .then(|| sniffed.to_string())
}

fn normalise_mime(raw: &str) -> String {
    let base = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match base.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => base,
    }
}

fn heif_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}
