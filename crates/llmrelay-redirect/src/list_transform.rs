use bytes::Bytes;
use llmrelay_protocol::{
    GeminiModelEntry, GeminiModelList, OpenAiModelEntry, OpenAiModelList, RedirectRuleSetV1,
    RedirectRuleSetV2,
};

/// The whitelist/merge source set for `/models` listing (spec §4.3
/// "When both V1 and V2 exist in a group, V2 source names are the sole
/// source set for listing; V1 is ignored at listing time").
pub fn listing_source_models(v1: &RedirectRuleSetV1, v2: &RedirectRuleSetV2) -> Vec<String> {
    if !v2.is_empty() {
        let mut names: Vec<String> = v2.keys().cloned().collect();
        names.sort();
        names
    } else {
        let mut names: Vec<String> = v1.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Transforms a `/models` response body, dispatching on its shape.
/// Unrecognized shapes are returned unchanged (spec §7 "when an upstream
/// model-list response shape is unrecognized, `TransformModelList` returns
/// it unchanged").
pub fn transform_model_list(
    body: &Bytes,
    has_page_token: bool,
    v1: &RedirectRuleSetV1,
    v2: &RedirectRuleSetV2,
    strict: bool,
) -> Bytes {
    let sources = listing_source_models(v1, v2);

    if let Ok(list) = serde_json::from_slice::<OpenAiModelList>(body) {
        let transformed = transform_openai_list(list, &sources, strict);
        if let Ok(bytes) = serde_json::to_vec(&transformed) {
            return Bytes::from(bytes);
        }
        return body.clone();
    }

    if let Ok(list) = serde_json::from_slice::<GeminiModelList>(body) {
        let transformed = transform_gemini_list(list, &sources, strict, has_page_token);
        if let Ok(bytes) = serde_json::to_vec(&transformed) {
            return Bytes::from(bytes);
        }
        return body.clone();
    }

    body.clone()
}

fn transform_openai_list(
    mut list: OpenAiModelList,
    sources: &[String],
    strict: bool,
) -> OpenAiModelList {
    if strict {
        list.data = sources
            .iter()
            .map(|id| OpenAiModelEntry {
                id: id.clone(),
                object: "model".to_string(),
                created: None,
                owned_by: None,
            })
            .collect();
        return list;
    }

    for source in sources {
        if !list.data.iter().any(|entry| &entry.id == source) {
            list.data.push(OpenAiModelEntry {
                id: source.clone(),
                object: "model".to_string(),
                created: None,
                owned_by: None,
            });
        }
    }
    list
}

fn transform_gemini_list(
    mut list: GeminiModelList,
    sources: &[String],
    strict: bool,
    has_page_token: bool,
) -> GeminiModelList {
    if strict {
        list.models = sources
            .iter()
            .map(|name| GeminiModelEntry {
                name: name.clone(),
                display_name: None,
                supported_generation_methods: Vec::new(),
                extra: Default::default(),
            })
            .collect();
        list.next_page_token = None;
        return list;
    }

    // Non-strict, paginated: only merge configured entries into the first
    // page; subsequent pages pass the upstream list through verbatim
    // (spec §4.3 "for paginated Gemini, merge only on the first page").
    if has_page_token {
        return list;
    }

    for source in sources {
        if !list.models.iter().any(|entry| &entry.name == source) {
            list.models.push(GeminiModelEntry {
                name: source.clone(),
                display_name: None,
                supported_generation_methods: Vec::new(),
                extra: Default::default(),
            });
        }
    }
    list
}
