//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! proxy. All types derive Serde traits for deserialization from config
//! files; every field has a default so a minimal config is valid.

use serde::{Deserialize, Serialize};

/// Root configuration for the SOCKS5 proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, admission cap).
    pub listener: ListenerConfig,

    /// Upstream dialing configuration.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address; the proxy is meant to serve loopback clients.
    pub bind_address: String,

    /// Maximum concurrent client connections. Zero or negative means
    /// unlimited.
    pub max_connections: i64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:1080".to_string(),
            max_connections: 0,
        }
    }
}

/// Upstream dialing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Dial resolved IPv4 addresses.
    pub enable_ipv4: bool,

    /// Dial resolved IPv6 addresses.
    pub enable_ipv6: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            enable_ipv4: true,
            enable_ipv6: true,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Expose a Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Address for the metrics endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_serve_loopback_unlimited() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address, "127.0.0.1:1080");
        assert_eq!(config.listener.max_connections, 0);
        assert!(config.upstream.enable_ipv4);
        assert!(config.upstream.enable_ipv6);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            max_connections = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.max_connections, 8);
        assert_eq!(config.listener.bind_address, "127.0.0.1:1080");
        assert!(config.upstream.enable_ipv6);
    }
}
