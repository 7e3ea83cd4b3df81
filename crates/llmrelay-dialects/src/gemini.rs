use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use llmrelay_channel::{construct_base_channel, send_validation_request, BaseChannel, ChannelProxy, DialectFactory, RelayRequest};
use llmrelay_client::ClientPool;
use llmrelay_common::{header_set, GatewayError};
use llmrelay_protocol::Group;
use tokio_util::sync::CancellationToken;

const CHANNEL_TYPE_TAG: &str = "gemini";
const OPENAI_COMPAT_MARKER: &str = "v1beta/openai";
const MODELS_SEGMENT: &str = "models/";

/// Gemini dialect (spec §4.4 table, "Gemini" row). Speaks two surfaces out
/// of the same group: the native `models/<name>[:<verb>]` path style, and
/// an OpenAI-compatible prefix (`v1beta/openai/...`) that behaves like the
/// OpenAI dialect for everything except credential placement.
pub struct GeminiChannel {
    base: BaseChannel,
}

fn is_openai_compat(path: &str) -> bool {
    path.contains(OPENAI_COMPAT_MARKER)
}

/// Extracts the model name from a native `.../models/<name>[:<verb>]` path.
fn model_from_path(path: &str) -> String {
    let Some(segment_start) = path.find(MODELS_SEGMENT) else {
        return String::new();
    };
    let rest = &path[segment_start + MODELS_SEGMENT.len()..];
    match rest.find(':') {
        Some(colon_idx) => rest[..colon_idx].to_string(),
        None => rest.to_string(),
    }
}

#[async_trait]
impl ChannelProxy for GeminiChannel {
    fn base(&self) -> &BaseChannel {
        &self.base
    }

    /// OpenAI-compat paths use a bearer token; every other path carries
    /// the key as a `key=` query parameter instead (spec §4.4 table).
    fn modify_request(&self, req: &mut RelayRequest, api_key: &str, _group: &Group) {
        if is_openai_compat(&req.path) {
            header_set(&mut req.headers, "Authorization", format!("Bearer {api_key}"));
            return;
        }

        let encoded = urlencoding::encode(api_key);
        req.query = Some(match &req.query {
            Some(existing) if !existing.is_empty() => format!("{existing}&key={encoded}"),
            _ => format!("key={encoded}"),
        });
    }

    /// Native streaming calls are recognizable by their `:streamGenerateContent`
    /// path suffix even before the shared Accept/query/body heuristics run
    /// (spec §4.4 "Stream detection ... Gemini additionally treats a path
    /// suffix of `:streamGenerateContent` as streaming").
    fn is_stream_request(&self, req: &RelayRequest) -> bool {
        req.path.ends_with(":streamGenerateContent") || self.base().is_stream_request_shared(req)
    }

    fn extract_model(&self, req: &RelayRequest) -> String {
        if is_openai_compat(&req.path) {
            self.base().extract_model_from_body(&req.body)
        } else {
            model_from_path(&req.path)
        }
    }

    fn apply_model_redirect(&self, req: &mut RelayRequest, group: &Group) -> Result<String, GatewayError> {
        if is_openai_compat(&req.path) {
            let (body, original) = self.base().apply_body_redirect(&req.body, group)?;
            req.body = body;
            Ok(original)
        } else {
            let (path, original) = self.base().apply_path_redirect(&req.path, group)?;
            req.path = path;
            Ok(original)
        }
    }

    async fn validate_key(
        &self,
        api_key: &str,
        group: &Group,
        cancel: CancellationToken,
    ) -> Result<bool, GatewayError> {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            group.validation_endpoint.trim_end_matches('/'),
            group.test_model,
            urlencoding::encode(api_key),
        );
        let payload = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
        });
        let body = Bytes::from(serde_json::to_vec(&payload).expect("static shape serializes"));
        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        send_validation_request(&self.base.fallback_client(), &endpoint, headers, Some(body), cancel).await
    }
}

pub struct GeminiDialectFactory;

#[async_trait]
impl DialectFactory for GeminiDialectFactory {
    async fn build(
        &self,
        group: &Group,
        client_pool: &ClientPool,
    ) -> Result<Arc<dyn ChannelProxy>, GatewayError> {
        let base = construct_base_channel(group, client_pool, CHANNEL_TYPE_TAG).await?;
        Ok(Arc::new(GeminiChannel { base }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_common::header_get;
    use llmrelay_protocol::{ChannelType, EffectiveConfig, UpstreamDefinition};
    use std::collections::HashMap;

    fn group() -> Group {
        Group {
            group_id: "g1".to_string(),
            name: "mygroup".to_string(),
            channel_type: ChannelType::Gemini,
            test_model: "gemini-1.5-pro".to_string(),
            validation_endpoint: "https://generativelanguage.googleapis.com".to_string(),
            upstreams: vec![UpstreamDefinition {
                url: "https://generativelanguage.googleapis.com".to_string(),
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

    async fn channel() -> Arc<dyn ChannelProxy> {
        let client_pool = ClientPool::new();
        GeminiDialectFactory.build(&group(), &client_pool).await.unwrap()
    }

    #[tokio::test]
    async fn native_path_gets_key_query_param_not_a_header() {
        let channel = channel().await;
        let g = group();
        let mut req = RelayRequest::new(
            vec![],
            "/proxy/mygroup/v1beta/models/gemini-pro:generateContent",
            None,
            Bytes::from_static(b"{}"),
        );
        channel.modify_request(&mut req, "abc123", &g);
        assert_eq!(header_get(&req.headers, "Authorization"), None);
        assert_eq!(req.query.as_deref(), Some("key=abc123"));
    }

    #[tokio::test]
    async fn openai_compat_path_gets_a_bearer_header() {
        let channel = channel().await;
        let g = group();
        let mut req = RelayRequest::new(
            vec![],
            "/proxy/mygroup/v1beta/openai/chat/completions",
            None,
            Bytes::from_static(b"{}"),
        );
        channel.modify_request(&mut req, "abc123", &g);
        assert_eq!(header_get(&req.headers, "Authorization"), Some("Bearer abc123"));
        assert_eq!(req.query, None);
    }

    #[tokio::test]
    async fn extracts_model_from_native_path() {
        let channel = channel().await;
        let req = RelayRequest::new(
            vec![],
            "/v1beta/models/gemini-1.5-pro:streamGenerateContent",
            None,
            Bytes::from_static(b"{}"),
        );
        assert_eq!(channel.extract_model(&req), "gemini-1.5-pro");
        assert!(channel.is_stream_request(&req));
    }

    #[tokio::test]
    async fn native_redirect_preserves_verb_suffix() {
        let channel = channel().await;
        let mut g = group();
        g.redirect_rules_v1.insert("gemini-pro".to_string(), "gemini-1.5-pro".to_string());
        let mut req = RelayRequest::new(
            vec![],
            "/v1beta/models/gemini-pro:generateContent".to_string(),
            None,
            Bytes::from_static(b"{}"),
        );
        let original = channel.apply_model_redirect(&mut req, &g).unwrap();
        assert_eq!(original, "gemini-pro");
        assert_eq!(req.path, "/v1beta/models/gemini-1.5-pro:generateContent");
    }
}
