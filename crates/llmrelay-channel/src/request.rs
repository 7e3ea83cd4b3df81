use std::sync::Arc;

use bytes::Bytes;
use llmrelay_common::Headers;
use wreq::Client;

/// An in-flight request as it travels through a `ChannelProxy`. Dialects
/// mutate `headers`, `path` and `body` in place as they authenticate,
/// redirect and otherwise adapt the call for its upstream.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub headers: Headers,
    pub path: String,
    pub query: Option<String>,
    pub body: Bytes,
}

impl RelayRequest {
    pub fn new(headers: Headers, path: impl Into<String>, query: Option<String>, body: Bytes) -> Self {
        Self {
            headers,
            path: path.into(),
            query,
            body,
        }
    }
}

/// The outcome of `select_upstream_with_clients`: a fully-built upstream
/// URL plus the HTTP clients to issue it with.
#[derive(Clone)]
pub struct Selection {
    pub upstream_url: String,
    pub http_client: Arc<Client>,
    pub stream_client: Arc<Client>,
    pub proxy_url: Option<String>,
}
