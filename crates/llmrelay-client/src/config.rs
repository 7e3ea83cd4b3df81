use std::time::Duration;

use llmrelay_protocol::EffectiveConfig;

/// Every field participates in [`ClientConfig::fingerprint`] — two configs
/// with the same fingerprint must produce behaviorally identical transports
/// (spec §4.1).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub idle_conn_timeout: Duration,
    pub max_idle_conns: u32,
    pub max_idle_conns_per_host: u32,
    pub response_header_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub expect_continue_timeout: Duration,
    pub disable_compression: bool,
    pub read_buffer_size: u32,
    pub write_buffer_size: u32,
    pub http2_attempt: bool,
    /// Whitespace-trimmed at construction time so `"  http://p  "` and
    /// `"http://p"` fingerprint identically (spec §4.1, §8 property).
    pub proxy_url: Option<String>,
}

impl ClientConfig {
    pub fn from_effective_config(effective: &EffectiveConfig, proxy_url: Option<&str>) -> Self {
        Self {
            connect_timeout: Duration::from_millis(effective.connect_timeout_ms),
            request_timeout: Duration::from_millis(effective.request_timeout_ms),
            idle_conn_timeout: Duration::from_millis(effective.idle_conn_timeout_ms),
            max_idle_conns: effective.max_idle_conns,
            max_idle_conns_per_host: effective.max_idle_conns_per_host,
            response_header_timeout: Duration::from_millis(effective.response_header_timeout_ms),
            tls_handshake_timeout: Duration::from_millis(effective.tls_handshake_timeout_ms),
            expect_continue_timeout: Duration::from_millis(effective.expect_continue_timeout_ms),
            disable_compression: effective.disable_compression,
            read_buffer_size: effective.read_buffer_size,
            write_buffer_size: effective.write_buffer_size,
            http2_attempt: effective.http2_attempt,
            proxy_url: normalize_proxy(proxy_url),
        }
    }

    /// Derives the streaming-path variant of this config: unbounded
    /// request timeout, compression disabled, doubled idle-pool caps
    /// (spec §3 `UpstreamInfo`: "StreamClient has RequestTimeout=0,
    /// disabled compression, doubled idle-pool caps").
    pub fn as_stream_variant(&self) -> Self {
        Self {
            request_timeout: Duration::ZERO,
            disable_compression: true,
            max_idle_conns: self.max_idle_conns.saturating_mul(2),
            max_idle_conns_per_host: self.max_idle_conns_per_host.saturating_mul(2),
            ..self.clone()
        }
    }

    /// `MaxConnsPerHost` is derived rather than configured, to allow burst
    /// above the steady-state idle pool (spec §4.1).
    pub fn max_conns_per_host(&self) -> u32 {
        (2 * self.max_idle_conns_per_host).max(10)
    }

    /// A deterministic, collision-free identity for this transport
    /// configuration, used as the `ClientPool` cache key.
    pub fn fingerprint(&self) -> String {
        format!(
            "ct={}|rt={}|ict={}|mic={}|micph={}|rht={}|tht={}|ect={}|dc={}|rbs={}|wbs={}|h2={}|px={}",
            self.connect_timeout.as_millis(),
            self.request_timeout.as_millis(),
            self.idle_conn_timeout.as_millis(),
            self.max_idle_conns,
            self.max_idle_conns_per_host,
            self.response_header_timeout.as_millis(),
            self.tls_handshake_timeout.as_millis(),
            self.expect_continue_timeout.as_millis(),
            self.disable_compression,
            self.read_buffer_size,
            self.write_buffer_size,
            self.http2_attempt,
            self.proxy_url.as_deref().unwrap_or(""),
        )
    }
}

pub fn normalize_proxy(proxy_url: Option<&str>) -> Option<String> {
    proxy_url
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ClientConfig {
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
            read_buffer_size: 4096,
            write_buffer_size: 4096,
            http2_attempt: true,
            proxy_url: None,
        }
    }

    #[test]
    fn fingerprint_is_whitespace_invariant_on_proxy() {
        let mut a = base();
        a.proxy_url = normalize_proxy(Some("  http://p:1  "));
        let mut b = base();
        b.proxy_url = normalize_proxy(Some("http://p:1"));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_differs_when_a_field_differs() {
        let a = base();
        let mut b = base();
        b.max_idle_conns_per_host = 20;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn max_conns_per_host_has_a_floor_of_ten() {
        let mut cfg = base();
        cfg.max_idle_conns_per_host = 1;
        assert_eq!(cfg.max_conns_per_host(), 10);
        cfg.max_idle_conns_per_host = 50;
        assert_eq!(cfg.max_conns_per_host(), 100);
    }

    #[test]
    fn stream_variant_zeroes_timeout_and_doubles_pool() {
        let cfg = base();
        let stream = cfg.as_stream_variant();
        assert_eq!(stream.request_timeout, Duration::ZERO);
        assert!(stream.disable_compression);
        assert_eq!(stream.max_idle_conns, 200);
        assert_eq!(stream.max_idle_conns_per_host, 20);
    }
}
