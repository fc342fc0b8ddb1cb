//! Configuration types for menu extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`],
//! built via its [`ExtractionConfigBuilder`]. The model's sampling knobs
//! live in a separate [`GenerationConfig`] because that struct is sent to
//! the Gemini API verbatim (camelCase on the wire).

use crate::error::MenuError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Environment variable holding the Gemini API key.
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Default Gemini REST endpoint (without the model path).
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Sampling parameters for one extraction call.
///
/// Serialises to the `generationConfig` object of a Gemini
/// `generateContent` request. `response_schema` is only populated when
/// [`ExtractionConfig::enforce_schema`] is on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
            response_mime_type: None,
            response_schema: None,
        }
    }
}

/// Which model backend performs the extraction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Backend {
    /// Gemini REST API with server-side response schema (default).
    #[default]
    Gemini,
    /// Any provider known to `edgequake_llm::ProviderFactory`
    /// ("openai", "anthropic", "ollama", …).
    Provider(String),
}

/// Configuration for a menu extraction.
///
/// # Example
/// ```rust
/// use menucraft::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .temperature(0.4)
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.generation.top_k, 64);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Backend used when no pre-built model is supplied. Default: Gemini.
    pub backend: Backend,

    /// Model identifier. If None, uses the backend default.
    pub model: Option<String>,

    /// API key for the Gemini backend. If None, read from `GEMINI_API_KEY`
    /// when the model is resolved.
    pub api_key: Option<String>,

    /// Gemini REST base URL. Overridable for proxies and tests.
    pub base_url: String,

    /// Pre-constructed provider for [`Backend::Provider`]. Takes precedence
    /// over the provider name.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling parameters.
    pub generation: GenerationConfig,

    /// Ask the model server to enforce [`crate::schema::response_schema`].
    /// Default: true. Ignored by backends that cannot enforce a schema; the
    /// prompt then carries the schema instead.
    pub enforce_schema: bool,

    /// Custom extraction prompt. If None, uses the built-in default.
    pub prompt: Option<String>,

    /// Largest accepted image upload in bytes. Default: 20 MiB.
    pub max_image_bytes: usize,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            model: None,
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            provider: None,
            generation: GenerationConfig::default(),
            enforce_schema: true,
            prompt: None,
            max_image_bytes: 20 * 1024 * 1024,
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("generation", &self.generation)
            .field("enforce_schema", &self.enforce_schema)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The generation config as sent to the model, with the response
    /// schema attached when schema enforcement is on.
    pub fn effective_generation(&self) -> GenerationConfig {
        let mut generation = self.generation.clone();
        if self.enforce_schema {
            generation.response_mime_type = Some("application/json".to_string());
            generation.response_schema = Some(crate::schema::response_schema());
        }
        generation
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.generation.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.generation.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn top_k(mut self, k: u32) -> Self {
        self.config.generation.top_k = k.max(1);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.generation.max_output_tokens = n;
        self
    }

    pub fn enforce_schema(mut self, v: bool) -> Self {
        self.config.enforce_schema = v;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn max_image_bytes(mut self, n: usize) -> Self {
        self.config.max_image_bytes = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, MenuError> {
        let c = &self.config;
        if c.generation.max_output_tokens == 0 {
            return Err(MenuError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_image_bytes == 0 {
            return Err(MenuError::InvalidConfig(
                "max_image_bytes must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(MenuError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.base_url.is_empty() {
            return Err(MenuError::InvalidConfig("base_url must not be empty".into()));
        }
        Ok(self.config)
    }
}
