use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use llmrelay_channel::{construct_base_channel, send_validation_request, BaseChannel, ChannelProxy, DialectFactory, RelayRequest};
use llmrelay_client::ClientPool;
use llmrelay_common::{header_set, GatewayError};
use llmrelay_protocol::Group;
use tokio_util::sync::CancellationToken;

const CHANNEL_TYPE_TAG: &str = "openai";

/// OpenAI Chat/Responses dialect (spec §4.4 table, "OpenAI" row): a single
/// bearer token, model name in the JSON body, no path rewriting.
pub struct OpenAiChannel {
    base: BaseChannel,
}

#[async_trait]
impl ChannelProxy for OpenAiChannel {
    fn base(&self) -> &BaseChannel {
        &self.base
    }

    fn modify_request(&self, req: &mut RelayRequest, api_key: &str, _group: &Group) {
        header_set(&mut req.headers, "Authorization", format!("Bearer {api_key}"));
    }

    async fn validate_key(
        &self,
        api_key: &str,
        group: &Group,
        cancel: CancellationToken,
    ) -> Result<bool, GatewayError> {
        let payload = serde_json::json!({
            "model": group.test_model,
            "messages": [{"role": "user", "content": "hi"}],
        });
        let body = Bytes::from(serde_json::to_vec(&payload).expect("static shape serializes"));
        let headers = vec![
            ("Authorization".to_string(), format!("Bearer {api_key}")),
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

pub struct OpenAiDialectFactory;

#[async_trait]
impl DialectFactory for OpenAiDialectFactory {
    async fn build(
        &self,
        group: &Group,
        client_pool: &ClientPool,
    ) -> Result<Arc<dyn ChannelProxy>, GatewayError> {
        let base = construct_base_channel(group, client_pool, CHANNEL_TYPE_TAG).await?;
        Ok(Arc::new(OpenAiChannel { base }))
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
            channel_type: ChannelType::OpenAI,
            test_model: "gpt-4o-mini".to_string(),
            validation_endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
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

    #[tokio::test]
    async fn build_installs_a_bearer_header_and_leaves_others_untouched() {
        let client_pool = ClientPool::new();
        let g = group();
        let dialect = OpenAiDialectFactory;
        let channel = dialect.build(&g, &client_pool).await.unwrap();

        let mut req = RelayRequest::new(
            vec![("X-Request-Id".to_string(), "abc".to_string())],
            "/proxy/mygroup/v1/chat/completions",
            None,
            Bytes::from_static(br#"{"model":"gpt-4o-mini"}"#),
        );
        channel.modify_request(&mut req, "sk-test-123", &g);

        assert_eq!(header_get(&req.headers, "Authorization"), Some("Bearer sk-test-123"));
        assert_eq!(header_get(&req.headers, "X-Request-Id"), Some("abc"));
    }
}
