//! RTMP endpoint configuration (spec §6, §9A), mirroring [`HttpConfig`](crate::http::HttpConfig)'s
//! builder shape.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::protocol::constants::{DEFAULT_PEER_BANDWIDTH, DEFAULT_WINDOW_ACK_SIZE};

#[derive(Debug, Clone)]
pub struct RtmpConfig {
    /// Address to bind the listening socket on.
    pub bind_addr: SocketAddr,

    /// Directory under which per-stream backend domain sockets live.
    pub backend_root: PathBuf,

    /// Window Ack Size a fresh session starts with — seeds
    /// `SessionState::rec_window_size`, the threshold the server announces
    /// to the peer and acks against (spec §3).
    pub window_ack_size: u32,

    /// Peer Bandwidth a fresh session starts with — seeds
    /// `SessionState::snd_window_size`, echoed back on a Peer Bandwidth
    /// message (spec §4.7).
    pub peer_bandwidth: u32,
}

impl Default for RtmpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:1935".parse().unwrap(),
            backend_root: PathBuf::from("/tmp/mist"),
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            peer_bandwidth: DEFAULT_PEER_BANDWIDTH,
        }
    }
}

impl RtmpConfig {
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Self::default()
        }
    }

    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn backend_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.backend_root = root.into();
        self
    }

    pub fn window_ack_size(mut self, size: u32) -> Self {
        self.window_ack_size = size;
        self
    }

    pub fn peer_bandwidth(mut self, size: u32) -> Self {
        self.peer_bandwidth = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = RtmpConfig::default();
        assert_eq!(config.bind_addr.port(), 1935);
        assert_eq!(config.window_ack_size, 2_500_000);
        assert_eq!(config.peer_bandwidth, 2_500_000);
    }

    #[test]
    fn builder_overrides_take_effect() {
        let config = RtmpConfig::default()
            .bind("127.0.0.1:19350".parse().unwrap())
            .backend_root("/var/mist")
            .window_ack_size(5_000_000)
            .peer_bandwidth(6_000_000);
        assert_eq!(config.bind_addr.port(), 19350);
        assert_eq!(config.backend_root, PathBuf::from("/var/mist"));
        assert_eq!(config.window_ack_size, 5_000_000);
        assert_eq!(config.peer_bandwidth, 6_000_000);
    }
}
