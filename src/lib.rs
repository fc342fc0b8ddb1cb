//! # menucraft
//!
//! Turn a photo of a restaurant menu into an editable, structured document
//! and render it back out as `menu.png`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo
//!  │
//!  ├─ 1. Input      validate bytes, resolve MIME type
//!  ├─ 2. Extract    one vision-model call (Gemini or any edgequake-llm provider)
//!  ├─ 3. Clean      strip Markdown fences / prose around the JSON
//!  ├─ 4. Normalize  validate structure, fill cosmetic defaults
//!  ├─ 5. Edit       copy-on-write snapshots, index-checked mutations
//!  └─ 6. Export     render to an RGBA surface, write menu.png
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use menucraft::{extract_menu, resolve_model, ExtractionConfig, ItemField, MenuEditor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let model = resolve_model(&config)?;
//!
//!     let bytes = std::fs::read("menu.jpg")?;
//!     let doc = extract_menu(model.as_ref(), bytes, Some("image/jpeg"), &config).await?;
//!
//!     let mut editor = MenuEditor::new(doc);
//!     editor.update_item_field(0, 0, ItemField::Price, "$12")?;
//!     println!("{}", editor.document().to_json_pretty());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP endpoints ([`server`]) |
//! | `cli`    | on      | The `menucraft` binary (clap + anyhow + tracing-subscriber) |
//!
//! For the library alone:
//! ```toml
//! menucraft = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod schema;
#[cfg(feature = "server")]
pub mod server;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Backend, ExtractionConfig, ExtractionConfigBuilder, GenerationConfig};
pub use editor::{Edit, MenuEditor, SharedEditor};
pub use error::{DecodeError, MenuError};
pub use export::{encode_png, export_png, EXPORT_FILE_NAME};
pub use extract::{extract_menu, extract_menu_from_file, extract_upload, resolve_model};
pub use model::{
    Contact, DocumentField, ItemField, ItemId, MenuDocument, MenuItem, MenuSection, SectionId,
};
pub use pipeline::encode::to_data_uri;
pub use pipeline::input::{load_local_image, ImageUpload};
pub use pipeline::llm::{GeminiModel, ProviderModel, VisionModel};
pub use pipeline::normalize::{decode_document, decode_saved_document, normalize_response};
pub use pipeline::render::{
    render_menu, render_menu_async, RenderOptions, RenderedMenu, MAX_SURFACE_PIXELS, MAX_WIDTH,
    MIN_WIDTH,
};
pub use session::{InFlightSlot, MenuSession, RequestToken};
