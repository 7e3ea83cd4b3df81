use llmrelay_common::RedirectError;
use llmrelay_protocol::{RedirectRuleSetV1, RedirectRuleSetV2};

use crate::engine::RedirectEngine;

const SEGMENT: &str = "models/";

/// Rewrites the `models/<name>[:<verb>]` segment of a native-Gemini URL
/// path, preserving the colon-suffixed verb (`generateContent`,
/// `streamGenerateContent`, …) untouched (spec §4.3 "Gemini, native
/// dialect").
pub fn apply_model_redirect_path(
    engine: &RedirectEngine,
    path: &str,
    v1: &RedirectRuleSetV1,
    v2: &RedirectRuleSetV2,
    strict: bool,
) -> Result<(String, String), RedirectError> {
    let Some(segment_start) = path.find(SEGMENT) else {
        return Ok((path.to_string(), String::new()));
    };
    let name_start = segment_start + SEGMENT.len();
    let rest = &path[name_start..];
    let (name, verb_with_colon) = match rest.find(':') {
        Some(colon_idx) => (&rest[..colon_idx], &rest[colon_idx..]),
        None => (rest, ""),
    };

    if v1.is_empty() && v2.is_empty() {
        return Ok((path.to_string(), String::new()));
    }

    let resolution = engine.resolve(name, v1, v2, strict)?;
    let Some(target) = resolution.target else {
        return Ok((path.to_string(), resolution.original_model));
    };

    let mut rewritten = String::with_capacity(path.len());
    rewritten.push_str(&path[..name_start]);
    rewritten.push_str(&target);
    rewritten.push_str(verb_with_colon);
    Ok((rewritten, resolution.original_model))
}
