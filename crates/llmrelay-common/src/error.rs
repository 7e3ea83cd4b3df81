use bytes::Bytes;

/// Error taxonomy shared by every layer of the proxy core (spec §7).
///
/// This enumerates *kinds*, not wire status codes — callers at the outer
/// handler boundary decide how each kind maps onto an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Unknown channel type, unparseable upstream URL, all upstreams
    /// zero-weight, malformed redirect-rule JSON. Fatal at channel
    /// construction; never cached.
    #[error("config error: {0}")]
    Config(String),

    /// `SelectUpstream` returned nothing despite construction having
    /// succeeded. This can only happen if an internal invariant was
    /// violated; treat as a bug, not a transient condition.
    #[error("selection invariant violated: {0}")]
    Selection(String),

    /// Strict mode rejected a request because no redirect rule matched the
    /// requested model, or a weighted-selection function returned an
    /// out-of-range index.
    #[error("redirect error: {0}")]
    Redirect(#[from] RedirectError),

    /// Network, TLS, proxy-connect, or DNS failure while contacting an
    /// upstream. Retryable at the outer handler's discretion.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response from upstream during validation or listing.
    #[error("upstream error: [status {status}] {message}")]
    Upstream { status: u16, message: String },

    /// The caller's cancellation handle fired before a response arrived.
    #[error("request cancelled")]
    Cancellation,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RedirectError {
    /// Strict mode is enabled and no V1/V2 rule matches the model.
    #[error("strict mode: no redirect rule for model {0:?}")]
    StrictModeReject(String),

    /// The injected weighted-selection function returned an index outside
    /// `[0, len)` of the candidate targets it was given.
    #[error("weighted selection returned out-of-range index {index} for {len} candidates")]
    SelectionFailed { index: usize, len: usize },

    /// Re-serializing a rewritten JSON body failed.
    #[error("failed to serialize redirected body: {0}")]
    Serialization(String),
}

/// A structured upstream error body, parsed from a non-2xx response.
/// Produced by the shared upstream-error extractor (spec §4.4).
#[derive(Debug, Clone)]
pub struct UpstreamErrorBody {
    pub status: u16,
    pub message: String,
    pub raw: Bytes,
}

impl UpstreamErrorBody {
    pub fn into_gateway_error(self) -> GatewayError {
        GatewayError::Upstream {
            status: self.status,
            message: self.message,
        }
    }
}

/// Extract a clean, human-readable message from a non-2xx upstream body.
///
/// Handles the common `{"error": {"message": "..."}}` and
/// `{"error": "..."}` shapes; falls back to the raw body (lossily decoded,
/// truncated) when the shape is unrecognized.
pub fn extract_upstream_error(status: u16, body: &Bytes) -> UpstreamErrorBody {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| {
                    error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(|s| s.to_string())
                        .or_else(|| error.as_str().map(|s| s.to_string()))
                })
                .or_else(|| {
                    value
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(|s| s.to_string())
                })
        })
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(body);
            text.chars().take(500).collect()
        });

    UpstreamErrorBody {
        status,
        message,
        raw: body.clone(),
    }
}
