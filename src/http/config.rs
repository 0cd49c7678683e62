//! HTTP connector configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the HTTP multiplexing gateway.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,

    /// Path to the stream-list JSON document (spec §6).
    pub streamlist_path: PathBuf,

    /// Directory under which per-protocol and per-stream backend domain
    /// sockets live (`<backend_root>/http_<tag>`, `<backend_root>/stream_<name>`).
    pub backend_root: PathBuf,

    /// How long a pool entry may sit unused before the eviction sweep
    /// removes it (spec §3, §4.4).
    pub idle_evict_after: Duration,

    /// How long to wait for a backend response before failing a proxied
    /// request with `504` (spec §4.3).
    pub backend_timeout: Duration,

    /// How often the eviction sweep re-scans the pool (spec §4.4).
    pub sweep_interval: Duration,

    /// `Server` header value stamped on successful proxied responses
    /// (spec §6).
    pub server_header: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            streamlist_path: PathBuf::from("/tmp/mist/streamlist"),
            backend_root: PathBuf::from("/tmp/mist"),
            idle_evict_after: Duration::from_secs(15),
            backend_timeout: Duration::from_secs(20),
            sweep_interval: Duration::from_secs(1),
            server_header: format!("mist-connect/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    /// Create a new config with a custom bind address.
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn streamlist_path(mut self, path: PathBuf) -> Self {
        self.streamlist_path = path;
        self
    }

    pub fn backend_root(mut self, path: PathBuf) -> Self {
        self.backend_root = path;
        self
    }

    pub fn idle_evict_after(mut self, timeout: Duration) -> Self {
        self.idle_evict_after = timeout;
        self
    }

    pub fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }
}
