mod base;
mod build;
mod channel;
mod factory;
mod registry;
mod request;
mod selector;

pub use base::BaseChannel;
pub use build::construct_base_channel;
pub use channel::{send_validation_request, ChannelProxy};
pub use factory::ChannelFactory;
pub use registry::{ChannelRegistry, DialectFactory};
pub use request::{RelayRequest, Selection};
pub use selector::{build_upstream_url, UpstreamInfo, UpstreamSelector};
