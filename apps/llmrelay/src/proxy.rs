use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;
use llmrelay_channel::RelayRequest;
use llmrelay_common::{GatewayError, RedirectError};
use llmrelay_protocol::Group;
use tracing::{info, warn};

use crate::state::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
const ROUTE_PREFIX: &str = "/proxy/";

/// Hop-by-hop headers (RFC 7230 §6.1) plus `Host`, which must be recomputed
/// against the selected upstream rather than carried from the caller.
const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// The generic `/proxy/<groupName>/...` entrypoint (spec §6 "Inbound
/// routing surface"). This stands in for the outer handler spec.md treats
/// as an external collaborator: it resolves the group, drives the
/// `ChannelProxy` capability set in the order spec §2 describes, and
/// streams the upstream response back unmodified except for the `/models`
/// listing transform.
pub async fn proxy(State(state): State<AppState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);

    let Some(group_name) = group_name_from_path(&path) else {
        return (StatusCode::NOT_FOUND, "expected /proxy/<group>/...").into_response();
    };

    let Some(group) = state.groups.get_group(&group_name).await else {
        return (StatusCode::NOT_FOUND, format!("unknown group {group_name:?}")).into_response();
    };

    let channel = match state.factory.get_channel(&group).await {
        Ok(channel) => channel,
        Err(err) => return gateway_error_response(&err),
    };

    let body_bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    let mut relay_req = RelayRequest::new(headers_to_vec(&parts.headers), path.clone(), query, body_bytes);

    let api_key = caller_credential(&parts.headers);
    channel.modify_request(&mut relay_req, &api_key, &group);

    if let Err(err) = channel.apply_model_redirect(&mut relay_req, &group) {
        return gateway_error_response(&err);
    }

    let is_stream = channel.is_stream_request(&relay_req);
    let is_models_listing = is_models_listing_path(&relay_req.path);

    let selection = match channel.select_upstream_with_clients(&relay_req) {
        Ok(selection) => selection,
        Err(err) => return gateway_error_response(&err),
    };
    let client = if is_stream {
        &selection.stream_client
    } else {
        &selection.http_client
    };

    info!(
        group = %group.name,
        upstream = %selection.upstream_url,
        stream = is_stream,
        "forwarding request"
    );

    let mut builder = client.request(parts.method.clone(), &selection.upstream_url);
    for (name, value) in &relay_req.headers {
        if is_stripped_header(name) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    if !relay_req.body.is_empty() {
        builder = builder.body(relay_req.body.clone());
    }

    let upstream_response = match builder.send().await {
        Ok(response) => response,
        Err(err) => return gateway_error_response(&GatewayError::Transport(err.to_string())),
    };

    let status = upstream_response.status().as_u16();
    let response_headers = passthrough_response_headers(upstream_response.headers());

    if is_models_listing && !is_stream {
        let body = match upstream_response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return gateway_error_response(&GatewayError::Transport(err.to_string())),
        };
        let transformed = channel.transform_model_list(&relay_req, &body, &group);
        return respond(status, response_headers, Body::from(transformed));
    }

    let stream = upstream_response
        .bytes_stream()
        .map_err(|err| std::io::Error::other(err.to_string()));
    respond(status, response_headers, Body::from_stream(stream))
}

fn respond(status: u16, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    *response.headers_mut() = headers;
    response
}

fn group_name_from_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix(ROUTE_PREFIX)?;
    let name = rest.split('/').next().unwrap_or("");
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Treated as a `/models` listing when the upstream-relative path (after
/// the group prefix) is exactly `models` or ends in `.../models` — matches
/// both OpenAI's `/v1/models` and Gemini's `/v1beta/models` shapes.
fn is_models_listing_path(path: &str) -> bool {
    path.trim_end_matches('/').ends_with("models")
        && !path.contains("models/")
}

fn is_stripped_header(name: &str) -> bool {
    STRIPPED_REQUEST_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

fn headers_to_vec(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn passthrough_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in upstream {
        if is_stripped_header(name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Reads the credential the caller attached to their own request and
/// forwards it as the upstream credential (`Authorization: Bearer`,
/// falling back to `x-api-key`). Caller authentication proper — verifying
/// that credential belongs to a tenant allowed to use this group — is the
/// external collaborator spec §1 excludes; this demo simply relays it.
fn caller_credential(headers: &HeaderMap) -> String {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return token.trim().to_string();
            }
        }
    }
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn gateway_error_response(err: &GatewayError) -> Response {
    let status = match err {
        GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::Selection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::Redirect(RedirectError::StrictModeReject(_)) => StatusCode::BAD_REQUEST,
        GatewayError::Redirect(RedirectError::SelectionFailed { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::Redirect(RedirectError::Serialization(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::Transport(_) => StatusCode::BAD_GATEWAY,
        GatewayError::Upstream { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        GatewayError::Cancellation => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_GATEWAY),
    };
    warn!(error = %err, "request failed");
    (status, err.to_string()).into_response()
}

/// Exposed so the admin surface (or a cron-style external worker, per
/// spec §1 "the orchestrating cron/worker is external") can validate a
/// credential against a group without going through the proxy path.
pub async fn validate_key(channel: &dyn llmrelay_channel::ChannelProxy, api_key: &str, group: &Group) -> bool {
    let cancel = tokio_util::sync::CancellationToken::new();
    match channel.validate_key(api_key, group, cancel).await {
        Ok(ok) => ok,
        Err(err) => {
            warn!(group = %group.name, error = %err, "key validation failed");
            false
        }
    }
}
