use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use llmrelay_common::GatewayError;
use tokio::sync::RwLock;
use tracing::{info, warn};
use wreq::redirect::Policy;
use wreq::{Client, Proxy};

use crate::config::ClientConfig;
use crate::proxy::{sanitize_for_log, spawn_reachability_probe, validate_proxy, ProxyAcceptance};

const MAX_REDIRECTS: usize = 10;

/// Fingerprint-keyed cache of HTTP transports, shared across all channels
/// whose merged transport config hashes to the same key (spec §4.1).
///
/// Two calls with semantically equivalent configs return the same `Arc`
/// instance — callers can rely on pointer equality, not just behavioral
/// equivalence.
#[derive(Default)]
pub struct ClientPool {
    clients: RwLock<HashMap<String, Arc<Client>>>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_client(&self, config: &ClientConfig) -> Result<Arc<Client>, GatewayError> {
        let key = config.fingerprint();

        // Fast path: shared read lock, no construction.
        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        // Slow path: exclusive lock, re-check before building (another
        // writer may have raced us between the read and here).
        let mut guard = self.clients.write().await;
        if let Some(client) = guard.get(&key) {
            return Ok(client.clone());
        }

        let client = Arc::new(build_client(config)?);
        guard.insert(key, client.clone());
        Ok(client)
    }

    /// Releases idle sockets across every cached client without evicting
    /// them from the fingerprint cache (spec §3 Lifecycles,
    /// §4.1 "Shutdown").
    pub async fn close_idle_connections(&self) {
        let guard = self.clients.read().await;
        for client in guard.values() {
            client.close_idle_connections();
        }
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }
}

fn build_client(config: &ClientConfig) -> Result<Client, GatewayError> {
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .pool_idle_timeout(config.idle_conn_timeout)
        .pool_max_idle_per_host(config.max_idle_conns_per_host as usize)
        .tcp_keepalive(config.idle_conn_timeout)
        .redirect(Policy::limited(MAX_REDIRECTS));

    if config.disable_compression {
        builder = builder
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .no_zstd();
    }

    if !config.http2_attempt {
        builder = builder.http1_only();
    }

    if let Some(proxy_url) = &config.proxy_url {
        builder = apply_proxy(builder, proxy_url);
    }

    builder.build().map_err(|err| {
        GatewayError::Config(format!("failed to build http client: {err}"))
    })
}

fn apply_proxy(
    builder: wreq::ClientBuilder,
    proxy_url: &str,
) -> wreq::ClientBuilder {
    let sanitized = sanitize_for_log(proxy_url);
    match validate_proxy(proxy_url) {
        ProxyAcceptance::Accepted { host, port } => match Proxy::all(proxy_url) {
            Ok(proxy) => {
                info!(proxy = %sanitized, "configured upstream proxy");
                spawn_reachability_probe(host, port, sanitized);
                builder.proxy(proxy)
            }
            Err(err) => {
                warn!(proxy = %sanitized, error = %err, "failed to parse proxy, falling back to environment proxy");
                builder
            }
        },
        ProxyAcceptance::Rejected { reason } => {
            warn!(proxy = %sanitized, reason, "rejected proxy configuration, falling back to environment proxy");
            builder
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cfg(proxy: Option<&str>) -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
            idle_conn_timeout: Duration::from_secs(90),
            max_idle_conns: 100,
            max_idle_conns_per_host: 10,
            response_header_timeout: Duration::from_secs(30),
            tls_handshake_timeout: Duration::from_secs(10),
            expect_continue_timeout: Duration::from_secs(1),
            disable_compression: false,
            read_buffer_size: 65536,
            write_buffer_size: 65536,
            http2_attempt: true,
            proxy_url: proxy.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn equivalent_configs_share_one_client_instance() {
        let pool = ClientPool::new();
        let a = pool.get_client(&cfg(None)).await.unwrap();
        let b = pool.get_client(&cfg(None)).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn differing_configs_get_distinct_clients() {
        let pool = ClientPool::new();
        let a = pool.get_client(&cfg(None)).await.unwrap();
        let mut other = cfg(None);
        other.max_idle_conns_per_host = 50;
        let b = pool.get_client(&other).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len().await, 2);
    }

    #[tokio::test]
    async fn whitespace_trimmed_proxy_shares_client_with_trimmed_equivalent() {
        let pool = ClientPool::new();
        let mut padded = cfg(None);
        padded.proxy_url = crate::config::normalize_proxy(Some("  http://p:1  "));
        let mut trimmed = cfg(None);
        trimmed.proxy_url = crate::config::normalize_proxy(Some("http://p:1"));
        let a = pool.get_client(&padded).await.unwrap();
        let b = pool.get_client(&trimmed).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
