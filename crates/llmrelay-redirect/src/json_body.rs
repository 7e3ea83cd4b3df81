use bytes::Bytes;
use llmrelay_common::RedirectError;
use llmrelay_protocol::{RedirectRuleSetV1, RedirectRuleSetV2};
use serde_json::Value;

use crate::engine::RedirectEngine;

/// Rewrites the `model` field of a JSON request body in place (spec §4.3
/// "OpenAI / Anthropic / Codex" — "the model name lives in the JSON body
/// under key `model`").
///
/// Returns the (possibly unchanged) body bytes and the model name the
/// caller sent, which is empty when no `model` key was present. Skips
/// parsing entirely when both rule sets are empty — the cheap-check
/// shortcut spec §9 calls out.
pub fn apply_model_redirect_body(
    engine: &RedirectEngine,
    body: &Bytes,
    v1: &RedirectRuleSetV1,
    v2: &RedirectRuleSetV2,
    strict: bool,
) -> Result<(Bytes, String), RedirectError> {
    if v1.is_empty() && v2.is_empty() {
        return Ok((body.clone(), String::new()));
    }
    if body.is_empty() {
        return Ok((body.clone(), String::new()));
    }

    let mut value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        // Non-JSON body: a deliberate, documented no-op (spec §7).
        Err(_) => return Ok((body.clone(), String::new())),
    };

    let Some(model) = value.get("model").and_then(Value::as_str).map(str::to_string) else {
        return Ok((body.clone(), String::new()));
    };

    let resolution = engine.resolve(&model, v1, v2, strict)?;
    let Some(target) = resolution.target else {
        return Ok((body.clone(), resolution.original_model));
    };

    if let Some(obj) = value.as_object_mut() {
        obj.insert("model".to_string(), Value::String(target));
    }
    let rewritten = serde_json::to_vec(&value)
        .map_err(|err| RedirectError::Serialization(err.to_string()))?;
    Ok((Bytes::from(rewritten), resolution.original_model))
}
