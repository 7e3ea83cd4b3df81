use std::collections::HashMap;
use std::sync::Arc;

use llmrelay_client::ClientPool;
use llmrelay_common::GatewayError;
use llmrelay_protocol::Group;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info};

use crate::channel::ChannelProxy;
use crate::registry::ChannelRegistry;

enum InFlightOutcome {
    Ready(Arc<dyn ChannelProxy>),
    Failed(String),
}

/// Single-flight, staleness-aware cache of live channels keyed by group id
/// (spec §4.5 "ChannelFactory"). Concurrent `get_channel` calls for the
/// same group id share one build; calls for different groups build
/// independently.
pub struct ChannelFactory {
    cache: RwLock<HashMap<String, Arc<dyn ChannelProxy>>>,
    inflight: Mutex<HashMap<String, watch::Receiver<Option<Arc<InFlightOutcome>>>>>,
    registry: ChannelRegistry,
    client_pool: Arc<ClientPool>,
}

impl ChannelFactory {
    pub fn new(registry: ChannelRegistry, client_pool: Arc<ClientPool>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            registry,
            client_pool,
        }
    }

    /// Returns the live channel for `group`, building or rebuilding it as
    /// needed. Only one caller per `group_id` ever runs the builder at a
    /// time; everyone else waits on that build's outcome (spec §4.5 steps
    /// 1-5).
    pub async fn get_channel(&self, group: &Group) -> Result<Arc<dyn ChannelProxy>, GatewayError> {
        if let Some(channel) = self.cache.read().await.get(&group.group_id) {
            if !channel.is_config_stale(group) {
                return Ok(channel.clone());
            }
        }

        let mut inflight = self.inflight.lock().await;
        if let Some(rx) = inflight.get(&group.group_id).cloned() {
            drop(inflight);
            debug!(group = %group.group_id, "joining in-flight channel build");
            return self.await_inflight(rx).await;
        }

        let (tx, rx) = watch::channel(None);
        inflight.insert(group.group_id.clone(), rx);
        drop(inflight);

        let build_result = self.build_and_install(group).await;

        // Remove the in-flight entry before releasing waiters, so a caller
        // that arrives between removal and the signal firing starts a
        // fresh build against the (by-then-installed) cache instead of
        // attaching to a handle that is about to disappear.
        self.inflight.lock().await.remove(&group.group_id);

        let outcome = match &build_result {
            Ok(channel) => Arc::new(InFlightOutcome::Ready(channel.clone())),
            Err(err) => Arc::new(InFlightOutcome::Failed(err.to_string())),
        };
        let _ = tx.send(Some(outcome));

        build_result
    }

    async fn await_inflight(
        &self,
        mut rx: watch::Receiver<Option<Arc<InFlightOutcome>>>,
    ) -> Result<Arc<dyn ChannelProxy>, GatewayError> {
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return match &*outcome {
                    InFlightOutcome::Ready(channel) => Ok(channel.clone()),
                    InFlightOutcome::Failed(message) => Err(GatewayError::Config(message.clone())),
                };
            }
            if rx.changed().await.is_err() {
                return Err(GatewayError::Config(
                    "channel builder ended without producing a result".to_string(),
                ));
            }
        }
    }

    async fn build_and_install(&self, group: &Group) -> Result<Arc<dyn ChannelProxy>, GatewayError> {
        let dialect = self.registry.get(group.channel_type).ok_or_else(|| {
            GatewayError::Config(format!(
                "no dialect registered for channel type {}",
                group.channel_type.as_str()
            ))
        })?;
        let channel = dialect.build(group, &self.client_pool).await?;

        let mut cache = self.cache.write().await;
        if let Some(existing) = cache.get(&group.group_id) {
            if !existing.is_config_stale(group) {
                // Another build for this group raced us to the cache lock
                // after this build started but before the in-flight slot
                // was freed; adopt the one already installed.
                return Ok(existing.clone());
            }
        }
        info!(group = %group.group_id, "installed channel");
        cache.insert(group.group_id.clone(), channel.clone());
        Ok(channel)
    }

    pub async fn invalidate_cache(&self, group_id: &str) {
        self.cache.write().await.remove(group_id);
    }

    pub async fn invalidate_all_caches(&self) {
        self.cache.write().await.clear();
    }
}
