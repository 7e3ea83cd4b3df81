mod config;
mod pool;
mod proxy;

pub use config::{normalize_proxy, ClientConfig};
pub use pool::ClientPool;
pub use proxy::{sanitize_for_log, validate_proxy, ProxyAcceptance};

pub use wreq::Client;
