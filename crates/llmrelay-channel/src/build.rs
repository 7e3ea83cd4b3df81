use std::sync::Arc;

use llmrelay_client::{ClientConfig, ClientPool};
use llmrelay_common::GatewayError;
use llmrelay_protocol::Group;
use llmrelay_redirect::RedirectEngine;

use crate::base::BaseChannel;
use crate::selector::{UpstreamInfo, UpstreamSelector};

/// Shared channel-construction logic every dialect's `DialectFactory`
/// calls into: drop disabled upstreams, build a live `UpstreamInfo` (http
/// + stream clients) for each survivor through the shared `ClientPool`,
/// and wrap the result in a `BaseChannel` (spec §4.5 step "construct
/// UpstreamInfo per upstream via ClientPool").
pub async fn construct_base_channel(
    group: &Group,
    client_pool: &ClientPool,
    channel_type_tag: &'static str,
) -> Result<BaseChannel, GatewayError> {
    let mut live_upstreams = Vec::new();
    for upstream in &group.upstreams {
        if upstream.weight <= 0 {
            continue;
        }

        let client_config =
            ClientConfig::from_effective_config(&group.effective_config, upstream.proxy_url.as_deref());
        let http_client = client_pool.get_client(&client_config).await?;
        let stream_client = client_pool.get_client(&client_config.as_stream_variant()).await?;

        live_upstreams.push(Arc::new(UpstreamInfo {
            url: upstream.url.clone(),
            weight: upstream.weight,
            proxy_url: client_config.proxy_url.clone(),
            http_client,
            stream_client,
        }));
    }

    if live_upstreams.is_empty() {
        return Err(GatewayError::Config(format!(
            "group {:?} has no enabled (weight > 0) upstreams",
            group.group_id
        )));
    }

    let fallback_client = live_upstreams[0].http_client.clone();
    let fallback_proxy_url = live_upstreams[0].proxy_url.clone();
    let selector = UpstreamSelector::new(live_upstreams);

    Ok(BaseChannel::new(
        group,
        channel_type_tag,
        selector,
        fallback_client,
        fallback_proxy_url,
        Arc::new(RedirectEngine::default()),
    ))
}
