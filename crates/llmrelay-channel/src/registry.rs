use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use llmrelay_client::ClientPool;
use llmrelay_common::GatewayError;
use llmrelay_protocol::{ChannelType, Group};

use crate::channel::ChannelProxy;

/// Builds the `ChannelProxy` for one vendor dialect out of a `Group`.
/// Implemented once per `ChannelType` and registered with
/// `ChannelRegistry::new` (spec §4.5 "dispatch on `ChannelType`").
#[async_trait]
pub trait DialectFactory: Send + Sync {
    async fn build(
        &self,
        group: &Group,
        client_pool: &ClientPool,
    ) -> Result<Arc<dyn ChannelProxy>, GatewayError>;
}

#[derive(Default)]
pub struct ChannelRegistry {
    dialects: HashMap<ChannelType, Arc<dyn DialectFactory>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel_type: ChannelType, factory: Arc<dyn DialectFactory>) {
        self.dialects.insert(channel_type, factory);
    }

    pub fn get(&self, channel_type: ChannelType) -> Option<Arc<dyn DialectFactory>> {
        self.dialects.get(&channel_type).cloned()
    }
}
