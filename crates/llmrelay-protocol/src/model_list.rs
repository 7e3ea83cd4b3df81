use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OpenAI-style `/models` listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiModelEntry {
    pub id: String,
    #[serde(default = "default_object")]
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

fn default_object() -> String {
    "model".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiModelList {
    pub data: Vec<OpenAiModelEntry>,
    /// Any other top-level fields the upstream returned, preserved verbatim
    /// so the transform never drops vendor extensions it doesn't know about.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Gemini-native `/models` listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiModelEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiModelList {
    pub models: Vec<GeminiModelEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}
