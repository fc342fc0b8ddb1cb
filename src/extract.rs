//! Extraction entry points: image in, [`MenuDocument`] out.
//!
//! [`extract_menu`] runs the whole pipeline for one upload:
//!
//! ```text
//! validate upload ─▶ model call (timeout) ─▶ clean text ─▶ normalize
//! ```
//!
//! Nothing is retried. A failure at any step is returned to the caller and
//! the caller's previous document (if any) is left alone.

use crate::config::{Backend, ExtractionConfig};
use crate::error::MenuError;
use crate::model::MenuDocument;
use crate::pipeline::input::{load_local_image, ImageUpload};
use crate::pipeline::llm::{request_menu, GeminiModel, ProviderModel, VisionModel};
use crate::pipeline::normalize::normalize_response;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default model for [`Backend::Provider`] when none is configured.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

/// Extract a menu from raw image bytes.
///
/// `mime_type` is the type declared by the client, if any; it is checked
/// against the bytes and sniffed when missing or generic.
pub async fn extract_menu(
    model: &dyn VisionModel,
    bytes: impl Into<Vec<u8>>,
    mime_type: Option<&str>,
    config: &ExtractionConfig,
) -> Result<MenuDocument, MenuError> {
    let upload = ImageUpload::new(bytes, mime_type, config.max_image_bytes)?;
    extract_upload(model, &upload, config).await
}

/// Extract a menu from an image file on disk.
pub async fn extract_menu_from_file(
    model: &dyn VisionModel,
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<MenuDocument, MenuError> {
    let upload = load_local_image(path.as_ref(), config.max_image_bytes).await?;
    extract_upload(model, &upload, config).await
}

/// Extract a menu from an already validated upload.
pub async fn extract_upload(
    model: &dyn VisionModel,
    upload: &ImageUpload,
    config: &ExtractionConfig,
) -> Result<MenuDocument, MenuError> {
    let start = Instant::now();
    let raw = request_menu(model, upload, config).await?;

    let doc = normalize_response(&raw).inspect_err(|e| {
        warn!("{} produced an unusable menu: {}", model.name(), e);
        debug!("Raw output: {}", raw);
    })?;

    info!(
        "Extracted '{}' ({} sections, {} items) in {:?}",
        doc.restaurant_name,
        doc.sections.len(),
        doc.item_count(),
        start.elapsed()
    );
    Ok(doc)
}

/// Resolve the vision model, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Named provider** ([`Backend::Provider`]): built by
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    API key from the environment.
/// 3. **Gemini** (default): `config.api_key`, else `GEMINI_API_KEY`.
pub fn resolve_model(config: &ExtractionConfig) -> Result<Arc<dyn VisionModel>, MenuError> {
    if let Some(ref provider) = config.provider {
        let label = config.model.as_deref().unwrap_or("custom-provider");
        return Ok(Arc::new(ProviderModel::new(Arc::clone(provider), label)));
    }

    match &config.backend {
        Backend::Provider(name) => {
            let model = config.model.as_deref().unwrap_or(DEFAULT_PROVIDER_MODEL);
            let provider = create_vision_provider(name, model)?;
            Ok(Arc::new(ProviderModel::new(provider, format!("{name}/{model}"))))
        }
        Backend::Gemini => Ok(Arc::new(GeminiModel::from_config(config)?)),
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, MenuError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        MenuError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
