use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use llmrelay_channel::{construct_base_channel, send_validation_request, BaseChannel, ChannelProxy, DialectFactory, RelayRequest};
use llmrelay_client::ClientPool;
use llmrelay_common::{header_set, GatewayError};
use llmrelay_protocol::Group;
use tokio_util::sync::CancellationToken;

const CHANNEL_TYPE_TAG: &str = "codex";

/// Codex/Responses dialect (spec §4.4 table, "Codex" row): bearer auth,
/// model name in the JSON body, no path rewriting — structurally the same
/// shape as OpenAI but kept as its own dialect since its validation
/// payload and `ForceStream` helper are Responses-API specific.
pub struct CodexChannel {
    base: BaseChannel,
}

#[async_trait]
impl ChannelProxy for CodexChannel {
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
            "input": "hi",
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

pub struct CodexDialectFactory;

#[async_trait]
impl DialectFactory for CodexDialectFactory {
    async fn build(
        &self,
        group: &Group,
        client_pool: &ClientPool,
    ) -> Result<Arc<dyn ChannelProxy>, GatewayError> {
        let base = construct_base_channel(group, client_pool, CHANNEL_TYPE_TAG).await?;
        Ok(Arc::new(CodexChannel { base }))
    }
}

/// Flips a Responses-API body's `stream` field to `true` when it is absent
/// or `false`, leaving everything else untouched. Lives outside
/// `ChannelProxy` on purpose — spec §4.4 places it as a helper the outer
/// handler calls, not a channel capability (spec §9 open question: "Whether
/// `ForceStream` ... is part of the channel contract or the outer handler").
/// A body that isn't a JSON object is returned unchanged.
pub fn force_stream(body: &Bytes) -> Bytes {
    let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return body.clone();
    };
    let Some(obj) = value.as_object_mut() else {
        return body.clone();
    };

    let already_streaming = obj.get("stream").and_then(|v| v.as_bool()).unwrap_or(false);
    if already_streaming {
        return body.clone();
    }
    obj.insert("stream".to_string(), serde_json::Value::Bool(true));

    match serde_json::to_vec(&value) {
        Ok(bytes) => Bytes::from(bytes),
        Err(_) => body.clone(),
    }
}
