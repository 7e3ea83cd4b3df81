use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use llmrelay_channel::{construct_base_channel, send_validation_request, BaseChannel, ChannelProxy, DialectFactory, RelayRequest};
use llmrelay_client::ClientPool;
use llmrelay_common::{header_contains, header_set, GatewayError};
use llmrelay_protocol::Group;
use tokio_util::sync::CancellationToken;

const CHANNEL_TYPE_TAG: &str = "anthropic";
const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages dialect (spec §4.4 table, "Anthropic" row): dual
/// credential placement (`Authorization` *and* `x-api-key`), a default
/// `anthropic-version` that never clobbers a caller-supplied one, and
/// `anthropic-beta` left untouched either way.
pub struct AnthropicChannel {
    base: BaseChannel,
}

#[async_trait]
impl ChannelProxy for AnthropicChannel {
    fn base(&self) -> &BaseChannel {
        &self.base
    }

    fn modify_request(&self, req: &mut RelayRequest, api_key: &str, _group: &Group) {
        header_set(&mut req.headers, "Authorization", format!("Bearer {api_key}"));
        header_set(&mut req.headers, "x-api-key", api_key.to_string());
        if !header_contains(&req.headers, "anthropic-version") {
            header_set(&mut req.headers, "anthropic-version", DEFAULT_ANTHROPIC_VERSION);
        }
    }

    async fn validate_key(
        &self,
        api_key: &str,
        group: &Group,
        cancel: CancellationToken,
    ) -> Result<bool, GatewayError> {
        let payload = serde_json::json!({
            "model": group.test_model,
            "max_tokens": 100,
            "messages": [{"role": "user", "content": "hi"}],
        });
        let body = Bytes::from(serde_json::to_vec(&payload).expect("static shape serializes"));
        let headers = vec![
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            ("x-api-key".to_string(), api_key.to_string()),
            ("anthropic-version".to_string(), DEFAULT_ANTHROPIC_VERSION.to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        send_validation_request(
            &self.base.fallback_client(),
            &group.validation_endpoint,
            headers,
            Some(body),
            cancel,
        )
        .await
    }
}

pub struct AnthropicDialectFactory;

#[async_trait]
impl DialectFactory for AnthropicDialectFactory {
    async fn build(
        &self,
        group: &Group,
        client_pool: &ClientPool,
    ) -> Result<Arc<dyn ChannelProxy>, GatewayError> {
        let base = construct_base_channel(group, client_pool, CHANNEL_TYPE_TAG).await?;
        Ok(Arc::new(AnthropicChannel { base }))
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
            channel_type: ChannelType::Anthropic,
            test_model: "claude-3-5-haiku-latest".to_string(),
            validation_endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            upstreams: vec![UpstreamDefinition {
                url: "https://api.anthropic.com".to_string(),
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
        AnthropicDialectFactory.build(&group(), &client_pool).await.unwrap()
    }

    #[tokio::test]
    async fn dual_auth_preserves_caller_version_and_beta() {
        let channel = channel().await;
        let g = group();
        let mut req = RelayRequest::new(
            vec![
                ("anthropic-version".to_string(), "2024-01-01".to_string()),
                ("anthropic-beta".to_string(), "computer-use".to_string()),
            ],
            "/proxy/mygroup/v1/messages",
            None,
            Bytes::from_static(br#"{"model":"claude-3-5-haiku-latest"}"#),
        );
        channel.modify_request(&mut req, "k", &g);

        assert_eq!(header_get(&req.headers, "Authorization"), Some("Bearer k"));
        assert_eq!(header_get(&req.headers, "x-api-key"), Some("k"));
        assert_eq!(header_get(&req.headers, "anthropic-version"), Some("2024-01-01"));
        assert_eq!(header_get(&req.headers, "anthropic-beta"), Some("computer-use"));
    }

    #[tokio::test]
    async fn missing_version_gets_the_default() {
        let channel = channel().await;
        let g = group();
        let mut req = RelayRequest::new(vec![], "/v1/messages", None, Bytes::from_static(b"{}"));
        channel.modify_request(&mut req, "k", &g);
        assert_eq!(header_get(&req.headers, "anthropic-version"), Some(DEFAULT_ANTHROPIC_VERSION));
    }
}
