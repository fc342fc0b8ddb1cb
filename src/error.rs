//! Error types for the menucraft library.
//!
//! Two error types reflect two distinct failure modes:
//!
//! * [`MenuError`]: **Fatal to the call**: the request cannot produce a
//!   result (no upload, upstream model failed, output unusable, bad edit
//!   address). Returned as `Err(MenuError)` from every public entry point.
//!
//! * [`DecodeError`]: **Structured detail** for why model output was
//!   rejected by the normalizer. Always wrapped in
//!   [`MenuError::MalformedResponse`] so callers can match on the JSON path
//!   that failed without parsing a message string.
//!
//! None of these errors is fatal to a session: a failed extraction leaves
//! the previous document in place and a failed edit leaves the current
//! snapshot untouched.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the menucraft library.
#[derive(Debug, Error)]
pub enum MenuError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no menu image at all.
    #[error("No file uploaded")]
    NoFileProvided,

    /// An image was supplied but cannot be sent to the model.
    #[error("Invalid menu image: {reason}")]
    InvalidImage { reason: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The upstream model call failed, was blocked, or returned nothing.
    #[error("Menu extraction failed: {detail}")]
    ExtractionFailure { detail: String },

    /// The upstream model call exceeded the configured timeout.
    #[error("Menu extraction timed out after {secs}s")]
    ExtractionTimeout { secs: u64 },

    /// The model answered, but the answer is not a usable menu.
    #[error("Malformed model response: {0}")]
    MalformedResponse(#[from] DecodeError),

    // ── Session errors ────────────────────────────────────────────────────
    /// An edit addressed a section or item that does not exist.
    #[error("{target} index {index} is out of range (length {len})")]
    IndexOutOfRange {
        target: &'static str,
        index: usize,
        len: usize,
    },

    /// An edit carried a value the document cannot hold.
    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    /// An edit was requested before any menu was extracted.
    #[error("No menu has been extracted yet")]
    NoDocument,

    /// A newer extraction request replaced this one before it completed.
    #[error("Extraction result discarded: a newer request superseded it")]
    Superseded,

    // ── Config errors ─────────────────────────────────────────────────────
    /// A required credential is absent from the environment.
    #[error("Missing credential: set the {var} environment variable")]
    MissingCredential { var: String },

    /// The configured LLM provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// The rendered surface would exceed the pixel budget.
    #[error("Menu is too large to render: {width}x{height} exceeds {max_pixels} pixels")]
    SurfaceTooLarge {
        width: u32,
        height: u64,
        max_pixels: u64,
    },

    /// Could not create or write the exported image.
    #[error("Failed to write '{path}': {source}")]
    ExportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MenuError {
    /// Whether retrying the same request manually may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MenuError::ExtractionFailure { .. } | MenuError::ExtractionTimeout { .. }
        )
    }

    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            MenuError::NoFileProvided => "No file uploaded",
            MenuError::InvalidImage { .. } => "Please select a valid image file.",
            MenuError::ExtractionFailure { .. }
            | MenuError::ExtractionTimeout { .. }
            | MenuError::MalformedResponse(_) => "Failed to process the menu. Please try again.",
            _ => "Something went wrong.",
        }
    }
}

/// Why a model response could not be decoded into a menu document.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The cleaned text is not valid JSON.
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The top-level JSON value is not an object.
    #[error("expected a JSON object at the top level, found {found}")]
    NotAnObject { found: &'static str },

    /// A structurally required field is absent, null or blank.
    #[error("required field '{path}' is missing")]
    MissingField { path: String },

    /// A field is present with the wrong JSON type.
    #[error("field '{path}' must be {expected}, found {found}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_file_display_matches_wire_message() {
        assert_eq!(MenuError::NoFileProvided.to_string(), "No file uploaded");
    }

    #[test]
    fn index_out_of_range_display() {
        let e = MenuError::IndexOutOfRange {
            target: "section",
            index: 4,
            len: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("section index 4"), "got: {msg}");
        assert!(msg.contains("length 2"), "got: {msg}");
    }

    #[test]
    fn decode_error_carries_path() {
        let e: MenuError = DecodeError::MissingField {
            path: "sections[0].items[2].price".into(),
        }
        .into();
        assert!(e.to_string().contains("sections[0].items[2].price"));
        assert!(!e.is_retryable());
    }

    #[test]
    fn extraction_errors_are_retryable() {
        assert!(MenuError::ExtractionTimeout { secs: 60 }.is_retryable());
        assert!(MenuError::ExtractionFailure {
            detail: "503".into()
        }
        .is_retryable());
        assert!(!MenuError::NoFileProvided.is_retryable());
    }

    #[test]
    fn surface_too_large_display() {
        let e = MenuError::SurfaceTooLarge {
            width: 1200,
            height: 90_000,
            max_pixels: 1_000,
        };
        let msg = e.to_string();
        assert!(msg.contains("1200x90000"), "got: {msg}");
        assert!(!e.is_retryable());
    }

    #[test]
    fn user_message_hides_detail() {
        let e = MenuError::ExtractionFailure {
            detail: "connection reset by peer".into(),
        };
        assert_eq!(e.user_message(), "Failed to process the menu. Please try again.");
    }
}
