use std::sync::Arc;

use bytes::Bytes;
use llmrelay_common::{header_get, GatewayError};
use llmrelay_protocol::{EffectiveConfig, Group, RedirectRuleSetV1, RedirectRuleSetV2};
use llmrelay_redirect::RedirectEngine;

use crate::request::{RelayRequest, Selection};
use crate::selector::{build_upstream_url, UpstreamSelector};

/// The slice of a group's configuration a channel was built from,
/// snapshotted at construction time so `is_config_stale` can compare it
/// against a freshly-fetched `Group` without re-deriving transports
/// (spec §3 "cached group fingerprints").
#[derive(Debug, Clone, PartialEq)]
struct ConfigFingerprint {
    channel_type_tag: &'static str,
    test_model: String,
    validation_endpoint: String,
    upstreams_json: String,
    effective_config: EffectiveConfig,
    redirect_rules_v1: RedirectRuleSetV1,
    redirect_rules_v2: RedirectRuleSetV2,
    strict_mode: bool,
}

/// Behavior shared by every `ChannelProxy` implementation: upstream
/// selection, URL building, staleness detection and the default
/// stream/model-extraction heuristics. Dialects embed one of these and
/// override only the vendor-specific pieces of the trait (spec §3
/// "Channel (live, per group)").
pub struct BaseChannel {
    pub group_id: String,
    pub name: String,
    selector: UpstreamSelector,
    fallback_client: Arc<llmrelay_client::Client>,
    fallback_proxy_url: Option<String>,
    pub test_model: String,
    pub validation_endpoint: String,
    pub redirect_engine: Arc<RedirectEngine>,
    fingerprint: ConfigFingerprint,
}

impl BaseChannel {
    pub fn new(
        group: &Group,
        channel_type_tag: &'static str,
        selector: UpstreamSelector,
        fallback_client: Arc<llmrelay_client::Client>,
        fallback_proxy_url: Option<String>,
        redirect_engine: Arc<RedirectEngine>,
    ) -> Self {
        Self {
            group_id: group.group_id.clone(),
            name: group.name.clone(),
            selector,
            fallback_client,
            fallback_proxy_url,
            test_model: group.test_model.clone(),
            validation_endpoint: group.validation_endpoint.clone(),
            redirect_engine,
            fingerprint: ConfigFingerprint {
                channel_type_tag,
                test_model: group.test_model.clone(),
                validation_endpoint: group.validation_endpoint.clone(),
                upstreams_json: group.upstreams_fingerprint(),
                effective_config: group.effective_config.clone(),
                redirect_rules_v1: group.redirect_rules_v1.clone(),
                redirect_rules_v2: group.redirect_rules_v2.clone(),
                strict_mode: group.strict_mode,
            },
        }
    }

    pub fn fallback_client(&self) -> Arc<llmrelay_client::Client> {
        self.fallback_client.clone()
    }

    pub fn fallback_proxy_url(&self) -> Option<&str> {
        self.fallback_proxy_url.as_deref()
    }

    pub fn select_upstream_with_clients(
        &self,
        original_path: &str,
        query: Option<&str>,
    ) -> Result<Selection, GatewayError> {
        let upstream = self.selector.select()?;
        let upstream_url = build_upstream_url(&upstream.url, &self.name, original_path, query);
        Ok(Selection {
            upstream_url,
            http_client: upstream.http_client.clone(),
            stream_client: upstream.stream_client.clone(),
            proxy_url: upstream.proxy_url.clone(),
        })
    }

    /// A fresh `Group` is stale against this channel if any field that
    /// feeds construction (upstreams, transport config, redirect rules,
    /// test model, validation endpoint, strict flag) differs from the
    /// snapshot taken when this channel was built.
    pub fn is_config_stale(&self, fresh: &Group) -> bool {
        let fresh_fp = ConfigFingerprint {
            channel_type_tag: self.fingerprint.channel_type_tag,
            test_model: fresh.test_model.clone(),
            validation_endpoint: fresh.validation_endpoint.clone(),
            upstreams_json: fresh.upstreams_fingerprint(),
            effective_config: fresh.effective_config.clone(),
            redirect_rules_v1: fresh.redirect_rules_v1.clone(),
            redirect_rules_v2: fresh.redirect_rules_v2.clone(),
            strict_mode: fresh.strict_mode,
        };
        fresh_fp != self.fingerprint
    }

    /// Shared stream-detection heuristic: an `Accept: text/event-stream`
    /// header, a `stream=true` query flag, or a top-level `"stream": true`
    /// JSON body field (spec §4.4 "is this a streaming call").
    pub fn is_stream_request_shared(&self, req: &RelayRequest) -> bool {
        if let Some(accept) = header_get(&req.headers, "accept") {
            if accept.contains("text/event-stream") {
                return true;
            }
        }
        if let Some(query) = &req.query {
            if query.split('&').any(|pair| pair == "stream=true") {
                return true;
            }
        }
        extract_bool_field(&req.body, "stream").unwrap_or(false)
    }

    /// Shared `model` extraction: a top-level `"model"` JSON string field.
    /// Dialects whose model lives elsewhere (Gemini's URL path) override
    /// this in the trait rather than here.
    pub fn extract_model_from_body(&self, body: &Bytes) -> String {
        extract_string_field(body, "model").unwrap_or_default()
    }

    /// Rewrites a JSON body's `model` field per the group's redirect
    /// rules. Used directly by the OpenAI/Anthropic/Codex dialects, and
    /// by Gemini for its OpenAI-compatible surface.
    pub fn apply_body_redirect(
        &self,
        body: &Bytes,
        group: &Group,
    ) -> Result<(Bytes, String), GatewayError> {
        llmrelay_redirect::apply_model_redirect_body(
            &self.redirect_engine,
            body,
            &group.redirect_rules_v1,
            &group.redirect_rules_v2,
            group.strict_mode,
        )
        .map_err(GatewayError::from)
    }

    /// Rewrites the `models/<name>` path segment per the group's redirect
    /// rules. Used by Gemini's native (non-OpenAI-compat) surface.
    pub fn apply_path_redirect(
        &self,
        path: &str,
        group: &Group,
    ) -> Result<(String, String), GatewayError> {
        llmrelay_redirect::apply_model_redirect_path(
            &self.redirect_engine,
            path,
            &group.redirect_rules_v1,
            &group.redirect_rules_v2,
            group.strict_mode,
        )
        .map_err(GatewayError::from)
    }

    pub fn transform_model_list_shared(
        &self,
        req: &RelayRequest,
        body: &Bytes,
        group: &Group,
    ) -> Bytes {
        let has_page_token = req
            .query
            .as_deref()
            .map(|q| q.contains("pageToken="))
            .unwrap_or(false);
        llmrelay_redirect::transform_model_list(
            body,
            has_page_token,
            &group.redirect_rules_v1,
            &group.redirect_rules_v2,
            group.strict_mode,
        )
    }
}

fn extract_string_field(body: &Bytes, field: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get(field)?.as_str().map(str::to_string)
}

fn extract_bool_field(body: &Bytes, field: &str) -> Option<bool> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get(field)?.as_bool()
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::{ChannelType, UpstreamDefinition};
    use std::collections::HashMap;

    fn group() -> Group {
        Group {
            group_id: "g1".to_string(),
            name: "mygroup".to_string(),
            channel_type: ChannelType::OpenAI,
            test_model: "gpt-4o-mini".to_string(),
            validation_endpoint: "https://api.openai.com/v1/models".to_string(),
            upstreams: vec![UpstreamDefinition {
                url: "https://api.openai.com".to_string(),
                weight: 100,
                proxy_url: None,
            }],
            effective_config: EffectiveConfig {
                connect_timeout_ms: 5000,
                request_timeout_ms: 60_000,
                idle_conn_timeout_ms: 90_000,
                max_idle_conns: 100,
                max_idle_conns_per_host: 10,
                response_header_timeout_ms: 30_000,
                tls_handshake_timeout_ms: 10_000,
                expect_continue_timeout_ms: 1000,
                disable_compression: false,
                read_buffer_size: 65536,
                write_buffer_size: 65536,
                http2_attempt: true,
            },
            redirect_rules_v1: HashMap::new(),
            redirect_rules_v2: HashMap::new(),
            strict_mode: false,
        }
    }

    fn base(g: &Group) -> BaseChannel {
        BaseChannel::new(
            g,
            "openai",
            UpstreamSelector::new(vec![]),
            Arc::new(llmrelay_client::Client::new()),
            None,
            Arc::new(RedirectEngine::default()),
        )
    }

    #[test]
    fn identical_group_snapshot_is_not_stale() {
        let g = group();
        let channel = base(&g);
        assert!(!channel.is_config_stale(&g));
    }

    #[test]
    fn changed_upstreams_mark_the_channel_stale() {
        let g = group();
        let channel = base(&g);
        let mut changed = g.clone();
        changed.upstreams[0].weight = 50;
        assert!(channel.is_config_stale(&changed));
    }

    #[test]
    fn stream_request_detected_via_accept_header() {
        let g = group();
        let channel = base(&g);
        let req = RelayRequest::new(
            vec![("Accept".to_string(), "text/event-stream".to_string())],
            "/v1/chat/completions",
            None,
            Bytes::from_static(b"{}"),
        );
        assert!(channel.is_stream_request_shared(&req));
    }

    #[test]
    fn stream_request_detected_via_body_flag() {
        let g = group();
        let channel = base(&g);
        let req = RelayRequest::new(
            vec![],
            "/v1/chat/completions",
            None,
            Bytes::from_static(br#"{"model":"gpt-4o-mini","stream":true}"#),
        );
        assert!(channel.is_stream_request_shared(&req));
        assert_eq!(channel.extract_model_from_body(&req.body), "gpt-4o-mini");
    }
}
