use std::sync::Arc;

use llmrelay_channel::{ChannelFactory, ChannelRegistry};
use llmrelay_client::ClientPool;

use crate::group_store::GroupStore;

/// Composition root for the demo binary: the core's `ChannelFactory` plus
/// the external collaborators spec.md excludes (the group store standing
/// in for persistence; caller authentication and request logging are not
/// modeled at all, per spec §1 "Out of scope").
#[derive(Clone)]
pub struct AppState {
    pub factory: Arc<ChannelFactory>,
    pub groups: Arc<dyn GroupStore>,
}

impl AppState {
    pub fn new(groups: Arc<dyn GroupStore>) -> Self {
        let mut registry = ChannelRegistry::new();
        llmrelay_dialects::register_all(&mut registry);
        let factory = Arc::new(ChannelFactory::new(registry, Arc::new(ClientPool::new())));
        Self { factory, groups }
    }
}
