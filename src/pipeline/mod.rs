//! Pipeline stages for menu extraction and rendering.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and a backend can be swapped without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ postprocess ──▶ normalize ──▶ (edit) ──▶ render
//! (upload)  (base64)   (VLM)   (fences)        (validate)              (RGBA)
//! ```
//!
//! 1. [`input`]: validate the uploaded bytes and resolve their MIME type
//! 2. [`encode`]: base64-wrap the image for the API body; `data:` URIs
//! 3. [`llm`]: the only stage with network I/O, bounded by a timeout
//! 4. [`postprocess`]: strip Markdown fences and prose around the JSON
//! 5. [`normalize`]: validate structure, fill cosmetic defaults, assign ids
//! 6. [`render`]: lay the document out on a surface; runs in
//!    `spawn_blocking` from async code

pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod postprocess;
pub mod render;
