//! Post-processing: deterministic cleanup of raw model output before it is
//! parsed as JSON.
//!
//! Even with a response schema, vision models occasionally dress their JSON
//! up: a ```` ```json ```` fence, a byte-order mark, a sentence of prose
//! before the object. None of that is *content*, so it is removed here with
//! cheap string rules, leaving [`crate::pipeline::normalize`] to judge the
//! structure.
//!
//! ## Rule Order
//!
//! Invisible characters go first so a BOM in front of a fence does not hide
//! the fence; fences are stripped before the prose trim so the trim sees the
//! bare object.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to raw model output.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (BOM, zero-width characters) around the text.
///    Characters inside the body are kept: joiners belong to some scripts
///    and to emoji sequences.
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip an outer Markdown fence, with or without a language tag
/// 4. Otherwise use the body of the first fenced block embedded in prose
/// 5. Trim prose around a lone JSON object
/// 6. Trim surrounding whitespace
pub fn clean_json_text(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = normalise_line_endings(&s);
    let s = strip_outer_fence(s.trim())
        .or_else(|| extract_inner_fence(&s))
        .unwrap_or(s);
    let s = trim_surrounding_prose(s.trim());
    s.trim().to_string()
}

// ── Rule 1: Remove invisible Unicode characters ─────────────────────────────

const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
];

fn remove_invisible_chars(input: &str) -> String {
    input
        .trim_matches(|c: char| c.is_whitespace() || INVISIBLE.contains(&c))
        .to_string()
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip outer fence ────────────────────────────────────────────────
//
// The language tag must start with a letter, so a JSON body (which starts
// with `{` or `[`) is never mistaken for one even on a single-line fence.

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[ \t]*(?:[A-Za-z][A-Za-z0-9_+\-]*)?[ \t]*\n?(.*?)\s*```\s*$").unwrap()
});

fn strip_outer_fence(input: &str) -> Option<String> {
    RE_OUTER_FENCE
        .captures(input)
        .map(|caps| caps[1].to_string())
}

// ── Rule 4: Fenced block inside prose ────────────────────────────────────────

static RE_INNER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:[A-Za-z][A-Za-z0-9_+\-]*)?[ \t]*\n(.*?)\n[ \t]*```").unwrap()
});

fn extract_inner_fence(input: &str) -> Option<String> {
    RE_INNER_FENCE
        .captures(input)
        .map(|caps| caps[1].to_string())
}

// ── Rule 5: Trim prose around a lone object ──────────────────────────────────
//
// "Here is the menu: { … } Let me know if …" → "{ … }". Only applied when
// the text does not already start with a JSON delimiter, and only when a
// closing brace exists after the opening one; truncated output is left
// alone so the parser reports it.

fn trim_surrounding_prose(input: &str) -> String {
    if input.starts_with('{') || input.starts_with('[') {
        return input.to_string();
    }
    match (input.find('{'), input.rfind('}')) {
        (Some(start), Some(end)) if end > start => input[start..=end].to_string(),
        _ => input.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"name":"Lunch","sections":[]}"#;

    #[test]
    fn test_strip_fence_with_language_tag() {
        let input = format!("```json\n{BODY}\n```");
        assert_eq!(clean_json_text(&input), clean_json_text(BODY));
    }

    #[test]
    fn test_strip_fence_without_tag() {
        let input = format!("```\n{BODY}\n```");
        assert_eq!(clean_json_text(&input), BODY);
    }

    #[test]
    fn test_strip_single_line_fence() {
        assert_eq!(clean_json_text(&format!("```json {BODY}```")), BODY);
        assert_eq!(clean_json_text(&format!("```{BODY}```")), BODY);
    }

    #[test]
    fn test_fence_with_surrounding_whitespace_and_crlf() {
        let input = format!("\r\n  ```JSON\r\n{BODY}\r\n```  \r\n");
        assert_eq!(clean_json_text(&input), BODY);
    }

    #[test]
    fn test_no_fence_passthrough() {
        assert_eq!(clean_json_text(BODY), BODY);
        assert_eq!(clean_json_text(&format!("  {BODY}\n")), BODY);
    }

    #[test]
    fn test_multiline_body_preserved_verbatim() {
        let body = "{\n  \"name\": \"Lunch\",\n  \"sections\": []\n}";
        let input = format!("```json\n{body}\n```");
        assert_eq!(clean_json_text(&input), body);
    }

    #[test]
    fn test_backticks_inside_strings_survive() {
        let body = r#"{"name":"```special```","sections":[]}"#;
        let input = format!("```json\n{body}\n```");
        assert_eq!(clean_json_text(&input), body);
    }

    #[test]
    fn test_fence_inside_prose() {
        let input = format!("Sure! Here is the menu:\n```json\n{BODY}\n```\nEnjoy.");
        assert_eq!(clean_json_text(&input), BODY);
    }

    #[test]
    fn test_prose_around_object() {
        let input = format!("Here is the JSON: {BODY} Let me know!");
        assert_eq!(clean_json_text(&input), BODY);
    }

    #[test]
    fn test_truncated_output_left_for_parser() {
        let input = r#"{"name":"Lunch","sections":[{"name":"Ma"#;
        assert_eq!(clean_json_text(input), input);
    }

    #[test]
    fn test_remove_invisible() {
        let input = format!("\u{FEFF}```json\n{BODY}\n```\u{200B}");
        assert_eq!(clean_json_text(&input), BODY);
    }

    #[test]
    fn test_inner_joiners_are_kept() {
        let body = "{\"name\": \"نان\u{200C}ها\", \"chef\": \"\u{1F468}\u{200D}\u{1F373}\", \"word\": \"ab\u{00AD}c\"}";
        let input = format!("\u{FEFF}\u{200B} ```json\n{body}\n``` \u{2060}");
        assert_eq!(clean_json_text(&input), body);
    }
}
