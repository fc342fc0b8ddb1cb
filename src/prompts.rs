//! Prompts for VLM-based menu extraction.
//!
//! Every prompt lives here so tests can inspect them without a model and so
//! the wording changes in exactly one place. Callers can override the
//! default via [`crate::config::ExtractionConfig::prompt`].

/// Default extraction instruction, sent alongside the menu photo.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"Generate a JSON representation of this menu image.

Rules:
- "name" is the menu heading as printed (e.g. "FOOD MENU", "Lunch").
- "restaurant" is the restaurant's name.
- Every printed section heading becomes one entry of "sections", in the order it appears.
- Every dish or drink becomes one entry of that section's "items", in the order it appears.
- Copy prices exactly as printed, including currency symbols. Never convert or compute prices.
- Leave "image" empty; pictures are added later.
- "contact" holds the phone number and street address if printed, otherwise empty strings.
- Output ONLY the JSON object. Do NOT wrap it in ```json fences. Do NOT add commentary."#;

/// Appended to the prompt for backends that cannot enforce a response
/// schema server-side.
pub const SCHEMA_SUFFIX: &str = r#"

The JSON object MUST have exactly this shape:
{
  "name": string,
  "restaurant": string,
  "sections": [
    { "name": string, "items": [ { "name": string, "price": string, "image": string } ] }
  ],
  "contact": { "phone": string, "address": string }
}"#;

/// Build the full prompt for one call.
pub fn extraction_prompt(custom: Option<&str>, embed_schema: bool) -> String {
    let base = custom.unwrap_or(DEFAULT_EXTRACTION_PROMPT);
    if embed_schema {
        format!("{base}{SCHEMA_SUFFIX}")
    } else {
        base.to_string()
    }
}
