//! One user's editing session: extraction, edits, render cache, export.
//!
//! ## In-flight guard
//!
//! Only the most recent extraction may install a document. Each call to
//! [`MenuSession::extract`] takes a [`RequestToken`] from the session's
//! [`InFlightSlot`]; when the call completes and its token is no longer the
//! latest, the result is discarded with [`MenuError::Superseded`]. In-flight
//! calls are not cancelled.
//!
//! ## Render cache
//!
//! The rendered surface is cached together with the snapshot it was drawn
//! from. Any edit produces a new snapshot, so a cached surface is only used
//! while its snapshot is still current and export never writes a stale
//! image.

use crate::config::ExtractionConfig;
use crate::editor::{Edit, SharedEditor};
use crate::error::MenuError;
use crate::export::export_png;
use crate::extract::extract_menu;
use crate::model::MenuDocument;
use crate::pipeline::llm::VisionModel;
use crate::pipeline::render::{render_menu_async, RenderOptions, RenderedMenu};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Identifies one extraction request within an [`InFlightSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(u64);

/// Single-slot guard: the latest token wins.
#[derive(Debug, Default)]
pub struct InFlightSlot {
    latest: AtomicU64,
}

impl InFlightSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding every earlier token.
    pub fn begin(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }
}

#[derive(Default)]
struct SessionState {
    editor: Option<SharedEditor>,
    surface: Option<(Arc<MenuDocument>, Arc<RenderedMenu>)>,
}

/// Extraction, editing and export for a single menu.
pub struct MenuSession {
    model: Arc<dyn VisionModel>,
    config: ExtractionConfig,
    render_options: RenderOptions,
    slot: InFlightSlot,
    state: RwLock<SessionState>,
}

impl MenuSession {
    pub fn new(model: Arc<dyn VisionModel>, config: ExtractionConfig) -> Self {
        Self {
            model,
            config,
            render_options: RenderOptions::default(),
            slot: InFlightSlot::new(),
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    /// Extract a menu and install it as the session's document.
    ///
    /// On failure the previous document stays in place.
    pub async fn extract(
        &self,
        bytes: impl Into<Vec<u8>>,
        mime_type: Option<&str>,
    ) -> Result<Arc<MenuDocument>, MenuError> {
        let token = self.slot.begin();
        let result = extract_menu(self.model.as_ref(), bytes, mime_type, &self.config).await;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if !self.slot.is_current(token) {
            info!("Discarding superseded extraction result");
            return Err(MenuError::Superseded);
        }
        let doc = result?;

        let snapshot = match &state.editor {
            Some(editor) => editor.replace(doc),
            None => {
                let editor = SharedEditor::new(doc);
                let snapshot = editor.snapshot();
                state.editor = Some(editor);
                snapshot
            }
        };
        state.surface = None;
        Ok(snapshot)
    }

    /// Apply an edit to the current document.
    pub async fn edit(&self, edit: Edit) -> Result<Arc<MenuDocument>, MenuError> {
        let state = self.state.read().await;
        let editor = state.editor.as_ref().ok_or(MenuError::NoDocument)?;
        editor.apply(edit)
    }

    /// The current snapshot, if a menu has been extracted.
    pub async fn document(&self) -> Option<Arc<MenuDocument>> {
        let state = self.state.read().await;
        state.editor.as_ref().map(SharedEditor::snapshot)
    }

    /// Editor handle for observers and writers in other tasks.
    pub async fn editor(&self) -> Option<SharedEditor> {
        self.state.read().await.editor.clone()
    }

    /// Render the current document, reusing the cached surface when the
    /// document has not changed since. `Ok(None)` before any extraction.
    pub async fn render(&self) -> Result<Option<Arc<RenderedMenu>>, MenuError> {
        let Some(doc) = self.document().await else {
            return Ok(None);
        };
        if let Some(surface) = self.cached_surface(&doc).await {
            debug!("Render cache hit");
            return Ok(Some(surface));
        }

        let surface = Arc::new(render_menu_async(Arc::clone(&doc), self.render_options).await?);
        self.state.write().await.surface = Some((doc, Arc::clone(&surface)));
        Ok(Some(surface))
    }

    /// Export the last rendered surface to `<dir>/menu.png`.
    ///
    /// A no-op returning `Ok(None)` when nothing has been rendered since the
    /// last change.
    pub async fn export(&self, dir: impl AsRef<Path>) -> Result<Option<PathBuf>, MenuError> {
        let surface = match self.document().await {
            Some(doc) => self.cached_surface(&doc).await,
            None => None,
        };
        export_png(surface.as_deref(), dir).await
    }

    /// Drop the document and surface, superseding any in-flight extraction.
    pub async fn reset(&self) {
        self.slot.begin();
        *self.state.write().await = SessionState::default();
        debug!("Session reset");
    }

    async fn cached_surface(&self, doc: &Arc<MenuDocument>) -> Option<Arc<RenderedMenu>> {
        let state = self.state.read().await;
        match &state.surface {
            Some((rendered_from, surface)) if Arc::ptr_eq(rendered_from, doc) => {
                Some(Arc::clone(surface))
            }
            _ => None,
        }
    }
}
