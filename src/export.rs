//! Export: rendered surface → `menu.png`.
//!
//! The PNG is written at the surface's natural resolution, one image pixel
//! per surface pixel. Exporting before anything has been rendered is not an
//! error: there is simply nothing to write, and the call returns `Ok(None)`.

use crate::error::MenuError;
use crate::pipeline::render::RenderedMenu;
use image::RgbaImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of every export.
pub const EXPORT_FILE_NAME: &str = "menu.png";

/// Encode a surface as PNG bytes.
pub fn encode_png(surface: &RenderedMenu) -> Result<Vec<u8>, MenuError> {
    encode_rgba(surface.image())
}

pub(crate) fn encode_rgba(img: &RgbaImage) -> Result<Vec<u8>, MenuError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| MenuError::Internal(format!("PNG encoding failed: {}", e)))?;
    debug!(
        "Encoded {}x{} surface → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Write `<dir>/menu.png`.
///
/// Returns `Ok(None)` without touching the filesystem when `surface` is
/// absent or zero-sized. The file is written to a temporary sibling first
/// and renamed into place, so a reader never sees a partial PNG.
pub async fn export_png(
    surface: Option<&RenderedMenu>,
    dir: impl AsRef<Path>,
) -> Result<Option<PathBuf>, MenuError> {
    let surface = match surface {
        Some(s) if !s.is_empty() => s,
        _ => {
            debug!("Export skipped: nothing rendered");
            return Ok(None);
        }
    };

    let bytes = encode_png(surface)?;
    let dir = dir.as_ref();
    let path = dir.join(EXPORT_FILE_NAME);
    let write_err = |source| MenuError::ExportWriteFailed {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_err)?;

    let tmp_path = path.with_extension("png.tmp");
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(write_err)?;

    info!(
        "Exported {}x{} menu to {}",
        surface.width(),
        surface.height(),
        path.display()
    );
    Ok(Some(path))
}
