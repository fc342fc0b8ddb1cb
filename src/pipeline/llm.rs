//! VLM interaction: send the menu photo to a vision model, get raw text back.
//!
//! This module is intentionally thin: prompt wording lives in
//! [`crate::prompts`], output cleanup in [`crate::pipeline::postprocess`]
//! and validation in [`crate::pipeline::normalize`].
//!
//! ## Backends
//!
//! [`VisionModel`] is the seam. Two implementations ship:
//!
//! * [`GeminiModel`] talks to the Gemini REST API directly so it can pass the
//!   full `generationConfig` (top-p, top-k and a `responseSchema`) that the
//!   server uses to constrain the output shape.
//! * [`ProviderModel`] wraps any `edgequake_llm` provider. Those providers
//!   cannot enforce a schema, so the schema travels in the prompt instead.
//!
//! Tests substitute their own `VisionModel` and never touch the network.
//!
//! ## No retries
//!
//! One call per extraction. Failures propagate to the caller, who decides
//! whether to let the user try again.

use crate::config::{ExtractionConfig, GenerationConfig, GEMINI_API_KEY_VAR};
use crate::error::MenuError;
use crate::pipeline::encode::encode_upload;
use crate::pipeline::input::ImageUpload;
use crate::prompts::extraction_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// A vision-capable model that turns a prompt plus an image into text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Human-readable backend/model label for logs.
    fn name(&self) -> &str;

    /// Whether the model server enforces `generation.response_schema`.
    fn enforces_schema(&self) -> bool {
        false
    }

    /// Perform exactly one model call.
    async fn generate(
        &self,
        prompt: &str,
        image: &ImageUpload,
        generation: &GenerationConfig,
    ) -> Result<String, MenuError>;
}

/// Ask `model` to transcribe the menu in `upload`; returns the raw output.
///
/// The call is bounded by `config.api_timeout_secs`. Empty or
/// whitespace-only output is an [`MenuError::ExtractionFailure`].
pub async fn request_menu(
    model: &dyn VisionModel,
    upload: &ImageUpload,
    config: &ExtractionConfig,
) -> Result<String, MenuError> {
    let start = Instant::now();
    let server_enforced = config.enforce_schema && model.enforces_schema();
    let prompt = extraction_prompt(config.prompt.as_deref(), !server_enforced);
    let generation = config.effective_generation();
    let secs = config.api_timeout_secs;

    info!(
        "Extracting menu via {} ({} bytes, {})",
        model.name(),
        upload.bytes.len(),
        upload.mime_type
    );

    let text = timeout(
        Duration::from_secs(secs),
        model.generate(&prompt, upload, &generation),
    )
    .await
    .map_err(|_| {
        warn!("{}: no answer after {}s", model.name(), secs);
        MenuError::ExtractionTimeout { secs }
    })??;

    if text.trim().is_empty() {
        return Err(MenuError::ExtractionFailure {
            detail: "model returned no content".into(),
        });
    }

    debug!(
        "{}: {} chars of output in {:?}",
        model.name(),
        text.len(),
        start.elapsed()
    );
    Ok(text)
}

// ── Gemini ───────────────────────────────────────────────────────────────

/// Gemini `generateContent` over plain HTTPS.
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    label: String,
    timeout_secs: u64,
}

impl GeminiModel {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, MenuError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| MenuError::Internal(format!("HTTP client: {e}")))?;
        let model = model.into();
        Ok(Self {
            client,
            api_key: api_key.into(),
            label: format!("gemini/{model}"),
            model,
            base_url: base_url.into(),
            timeout_secs,
        })
    }

    /// Build from config, reading `GEMINI_API_KEY` when no key is set.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, MenuError> {
        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => std::env::var(GEMINI_API_KEY_VAR)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| MenuError::MissingCredential {
                    var: GEMINI_API_KEY_VAR.to_string(),
                })?,
        };
        let model = config
            .model
            .as_deref()
            .unwrap_or(crate::config::DEFAULT_GEMINI_MODEL);
        Self::new(api_key, model, config.base_url.as_str(), config.api_timeout_secs)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: &'a GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, MenuError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(MenuError::ExtractionFailure {
                detail: format!("request blocked by the model: {reason}"),
            });
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| MenuError::ExtractionFailure {
                detail: "model returned no candidates".into(),
            })?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(MenuError::ExtractionFailure {
                detail: format!(
                    "model returned no content (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    fn name(&self) -> &str {
        &self.label
    }

    fn enforces_schema(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        prompt: &str,
        image: &ImageUpload,
        generation: &GenerationConfig,
    ) -> Result<String, MenuError> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![
                    RequestPart::Text { text: prompt },
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: encode_upload(image),
                        },
                    },
                ],
            }],
            generation_config: generation,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MenuError::ExtractionTimeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    MenuError::ExtractionFailure {
                        detail: format!("request to {} failed: {}", self.label, e),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MenuError::ExtractionFailure {
                detail: format!("{} returned HTTP {}: {}", self.label, status, truncate(&body, 300)),
            });
        }

        let parsed: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| MenuError::ExtractionFailure {
                    detail: format!("unreadable response from {}: {}", self.label, e),
                })?;

        parsed.into_text()
    }
}

// ── edgequake-llm providers ──────────────────────────────────────────────

/// Any `edgequake_llm` provider used as a vision model.
///
/// Only temperature and the token budget are forwarded; the provider API
/// has no top-k or response schema.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl VisionModel for ProviderModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(
        &self,
        prompt: &str,
        image: &ImageUpload,
        generation: &GenerationConfig,
    ) -> Result<String, MenuError> {
        let image_data = ImageData::new(encode_upload(image), image.mime_type.as_str());
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];
        let options = build_options(generation);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| MenuError::ExtractionFailure {
                detail: format!("{}: {}", self.label, e),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the generation config.
fn build_options(generation: &GenerationConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(generation.temperature),
        max_tokens: Some(generation.max_output_tokens as usize),
        ..Default::default()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
