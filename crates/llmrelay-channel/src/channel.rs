use async_trait::async_trait;
use bytes::Bytes;
use llmrelay_common::GatewayError;
use llmrelay_protocol::Group;
use tokio_util::sync::CancellationToken;

use crate::base::BaseChannel;
use crate::request::{RelayRequest, Selection};

/// The capability set every vendor dialect implements over a shared
/// `BaseChannel` (spec §6 "ChannelProxy"). Methods with a default body
/// delegate to the base channel's shared logic; dialects override only
/// where their wire protocol actually differs.
#[async_trait]
pub trait ChannelProxy: Send + Sync {
    fn base(&self) -> &BaseChannel;

    fn select_upstream_with_clients(&self, req: &RelayRequest) -> Result<Selection, GatewayError> {
        self.base()
            .select_upstream_with_clients(&req.path, req.query.as_deref())
    }

    fn is_config_stale(&self, group: &Group) -> bool {
        self.base().is_config_stale(group)
    }

    /// Applies the dialect's authentication header(s) and any other
    /// per-call header fixups. Must be idempotent: called once per
    /// request, never retried with an already-modified request.
    fn modify_request(&self, req: &mut RelayRequest, api_key: &str, group: &Group);

    fn is_stream_request(&self, req: &RelayRequest) -> bool {
        self.base().is_stream_request_shared(req)
    }

    fn extract_model(&self, req: &RelayRequest) -> String {
        self.base().extract_model_from_body(&req.body)
    }

    /// Confirms `api_key` is accepted by the upstream named in the
    /// group's `validation_endpoint`, using the channel's fallback
    /// client (spec §3 "fallback clients").
    async fn validate_key(
        &self,
        api_key: &str,
        group: &Group,
        cancel: CancellationToken,
    ) -> Result<bool, GatewayError>;

    /// Rewrites `req` in place per the group's redirect rules and returns
    /// the model name the caller originally sent (empty if none).
    fn apply_model_redirect(&self, req: &mut RelayRequest, group: &Group) -> Result<String, GatewayError> {
        let (body, original) = self.base().apply_body_redirect(&req.body, group)?;
        req.body = body;
        Ok(original)
    }

    fn transform_model_list(&self, req: &RelayRequest, body: &Bytes, group: &Group) -> Bytes {
        self.base().transform_model_list_shared(req, body, group)
    }
}

/// Issues the validation call against `endpoint` with the dialect-supplied
/// headers (and, for dialects whose validation payload is a POST body,
/// the request body) already attached, honoring cancellation (spec §4.4
/// "ValidateKey ... honors the caller's cancellation handle").
///
/// Any 2xx response is success (spec §4.4 "Validation success criterion").
/// A non-2xx response is run through the shared upstream-error extractor
/// and surfaced as `GatewayError::Upstream` with a clean message (spec §7);
/// a network/TLS/DNS failure surfaces as `GatewayError::Transport`.
pub async fn send_validation_request(
    client: &llmrelay_client::Client,
    endpoint: &str,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    cancel: CancellationToken,
) -> Result<bool, GatewayError> {
    let mut builder = match &body {
        Some(_) => client.post(endpoint),
        None => client.get(endpoint),
    };
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    if let Some(body) = body {
        builder = builder.body(body);
    }

    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(GatewayError::Cancellation),
        result = builder.send() => result,
    }
    .map_err(|err| GatewayError::Transport(err.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(true);
    }

    let body = tokio::select! {
        _ = cancel.cancelled() => return Err(GatewayError::Cancellation),
        result = response.bytes() => result,
    }
    .map_err(|err| GatewayError::Transport(err.to_string()))?;

    Err(llmrelay_common::extract_upstream_error(status.as_u16(), &body).into_gateway_error())
}
