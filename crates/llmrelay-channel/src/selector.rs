use std::sync::{Arc, Mutex};

use llmrelay_client::Client;
use llmrelay_common::GatewayError;

/// A live, weighted backend endpoint. Built once at channel construction
/// and never mutated afterwards — `UpstreamSelector` tracks the smooth
/// weighted round-robin state for it separately, in `Slot::current_weight`.
pub struct UpstreamInfo {
    pub url: String,
    pub weight: i64,
    pub proxy_url: Option<String>,
    pub http_client: Arc<Client>,
    /// Same transport, tuned for long-lived streaming responses (spec
    /// §3 "StreamClient has RequestTimeout=0, disabled compression,
    /// doubled idle-pool caps").
    pub stream_client: Arc<Client>,
}

struct Slot {
    info: Arc<UpstreamInfo>,
    current_weight: i64,
}

/// Nginx-style smooth weighted round-robin over a channel's live
/// upstreams (spec §4.2). A single mutex serializes the scan-and-pick
/// step; the algorithm itself is the textbook SWRR recurrence:
///
/// 1. `S = sum(weight)`
/// 2. every slot's `current_weight += weight`
/// 3. pick the slot with the largest `current_weight`
/// 4. that slot's `current_weight -= S`
pub struct UpstreamSelector {
    slots: Mutex<Vec<Slot>>,
}

impl UpstreamSelector {
    /// Weight-zero-or-negative upstreams are dropped by the caller before
    /// construction (spec §6 "weights `<=0` mean disabled"); an empty
    /// upstream list is a construction-time error, not a runtime one, and
    /// is rejected by the channel factory rather than here.
    pub fn new(upstreams: Vec<Arc<UpstreamInfo>>) -> Self {
        let slots = upstreams
            .into_iter()
            .map(|info| Slot {
                info,
                current_weight: 0,
            })
            .collect();
        Self {
            slots: Mutex::new(slots),
        }
    }

    pub fn len(&self) -> Result<usize, GatewayError> {
        Ok(self.lock_slots()?.len())
    }

    /// Returns the next upstream per the SWRR recurrence above. Only
    /// returns `None` if constructed with zero upstreams, which the
    /// factory never does (spec §7 "`SelectUpstream` returned nothing
    /// despite construction having succeeded" is treated as a bug).
    pub fn select(&self) -> Result<Arc<UpstreamInfo>, GatewayError> {
        let mut slots = self.lock_slots()?;
        if slots.is_empty() {
            return Err(GatewayError::Selection(
                "upstream selector holds no live upstreams".to_string(),
            ));
        }

        let total: i64 = slots.iter().map(|slot| slot.info.weight).sum();

        let mut best_index = 0;
        let mut best_weight = i64::MIN;
        for (index, slot) in slots.iter_mut().enumerate() {
            slot.current_weight += slot.info.weight;
            if slot.current_weight > best_weight {
                best_weight = slot.current_weight;
                best_index = index;
            }
        }

        slots[best_index].current_weight -= total;
        Ok(slots[best_index].info.clone())
    }

    /// Acquires the slot lock, surfacing poisoning as a `Selection` error
    /// rather than panicking (matches the teacher's `.lock().map_err(...)`
    /// idiom for mutex poisoning, e.g. `gproxy-provider-impl`'s tokenizer
    /// cache).
    fn lock_slots(&self) -> Result<std::sync::MutexGuard<'_, Vec<Slot>>, GatewayError> {
        self.slots.lock().map_err(|_| {
            GatewayError::Selection("upstream selector mutex poisoned".to_string())
        })
    }
}

/// Strips a request's `/proxy/<group_name>` routing prefix and rebuilds it
/// against the selected upstream's base URL, carrying the query string
/// through unchanged (spec §4.2 `BuildUpstreamURL`).
pub fn build_upstream_url(
    upstream_base: &str,
    group_name: &str,
    original_path: &str,
    query: Option<&str>,
) -> String {
    let prefix = format!("/proxy/{group_name}");
    let remainder = original_path
        .strip_prefix(&prefix)
        .unwrap_or(original_path);

    let base = upstream_base.trim_end_matches('/');
    let remainder = if remainder.is_empty() {
        "/"
    } else if remainder.starts_with('/') {
        remainder
    } else {
        return format!("{base}/{remainder}{}", query_suffix(query));
    };

    format!("{base}{remainder}{}", query_suffix(query))
}

fn query_suffix(query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("?{q}"),
        _ => String::new(),
    }
}
