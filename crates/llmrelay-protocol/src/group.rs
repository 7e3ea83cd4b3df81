use serde::{Deserialize, Serialize};

use crate::redirect::{RedirectRuleSetV1, RedirectRuleSetV2};

/// The vendor dialect a group speaks. Determines which `ChannelProxy`
/// implementation the factory builds for the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    OpenAI,
    Anthropic,
    Gemini,
    Codex,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::OpenAI => "openai",
            ChannelType::Anthropic => "anthropic",
            ChannelType::Gemini => "gemini",
            ChannelType::Codex => "codex",
        }
    }
}

/// One weighted backend endpoint within a group, as persisted by the
/// external store (spec §6 "Upstream definition JSON").
///
/// Weights `<= 0` mean *disabled*; the factory drops these at construction
/// time and never hands them to the selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamDefinition {
    pub url: String,
    pub weight: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

/// Transport tuning consumed by `ClientPool` (spec §4.1). The core requires
/// every numeric field to be fully specified by the group's store — it does
/// not invent defaults for a half-configured transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub idle_conn_timeout_ms: u64,
    pub max_idle_conns: u32,
    pub max_idle_conns_per_host: u32,
    pub response_header_timeout_ms: u64,
    pub tls_handshake_timeout_ms: u64,
    pub expect_continue_timeout_ms: u64,
    pub disable_compression: bool,
    pub read_buffer_size: u32,
    pub write_buffer_size: u32,
    pub http2_attempt: bool,
}

/// Opaque tenant configuration, as handed to the core by the external
/// store. The core never mutates a `Group`; it only reads it to build or
/// refresh a `Channel` and to evaluate `IsConfigStale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub group_id: String,
    pub name: String,
    pub channel_type: ChannelType,
    pub test_model: String,
    pub validation_endpoint: String,
    pub upstreams: Vec<UpstreamDefinition>,
    pub effective_config: EffectiveConfig,
    #[serde(default)]
    pub redirect_rules_v1: RedirectRuleSetV1,
    #[serde(default)]
    pub redirect_rules_v2: RedirectRuleSetV2,
    #[serde(default)]
    pub strict_mode: bool,
}

impl Group {
    /// The raw upstreams as persisted JSON, used as part of the channel's
    /// staleness fingerprint (spec §3 "cached group fingerprints").
    ///
    /// Deliberately re-serializes rather than storing the original bytes:
    /// spec.md's Open Questions accept that a reordered-keys write from the
    /// external store can trigger a spurious rebuild.
    pub fn upstreams_fingerprint(&self) -> String {
        serde_json::to_string(&self.upstreams).unwrap_or_default()
    }
}
